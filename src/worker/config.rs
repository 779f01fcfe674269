use crate::client::{
    AggregatorFunction, FunctionArg, Reducer, ServerAddress, WorkerFunction, WorkerOptions,
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
};
use anyhow::{bail, Context, Result};
use std::fmt;
use std::time::Duration;

/// Default bound on a single poll-and-execute cycle, and therefore on how long
/// a worker takes to notice a shutdown request.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// Default bound on how long a start call waits for the worker to connect and
/// register.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything one worker thread needs to connect, register and poll.
///
/// Only obtainable through [`WorkerConfig::builder`] or [`WorkerConfig::new`],
/// both of which validate, so a worker thread never sees an unchecked value.
#[derive(Clone)]
pub struct WorkerConfig {
    server: ServerAddress,
    function_name: String,
    function: WorkerFunction,
    function_arg: Option<FunctionArg>,
    options: WorkerOptions,
    reducer: Reducer,
    aggregator: Option<AggregatorFunction>,
    function_timeout: Duration,
    poll_timeout: Duration,
    ready_timeout: Duration,
}

pub struct WorkerConfigParams {
    pub server: ServerAddress,
    pub function_name: String,
    pub function: WorkerFunction,
    pub function_arg: Option<FunctionArg>,
    pub options: WorkerOptions,
    pub reducer: Reducer,
    pub aggregator: Option<AggregatorFunction>,
    pub function_timeout: Duration,
    pub poll_timeout: Duration,
    pub ready_timeout: Duration,
}

impl WorkerConfig {
    /// Builder with the default host, port and timeouts filled in at `build`.
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// Trims the host, then validates. The function name is kept as given.
    pub fn new(params: WorkerConfigParams) -> Result<Self> {
        let WorkerConfigParams {
            server,
            function_name,
            function,
            function_arg,
            options,
            reducer,
            aggregator,
            function_timeout,
            poll_timeout,
            ready_timeout,
        } = params;

        let server = ServerAddress::new(server.host().trim(), server.port());
        let config = Self {
            server,
            function_name,
            function,
            function_arg,
            options,
            reducer,
            aggregator,
            function_timeout,
            poll_timeout,
            ready_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn function(&self) -> &WorkerFunction {
        &self.function
    }

    pub fn function_arg(&self) -> Option<&FunctionArg> {
        self.function_arg.as_ref()
    }

    pub fn options(&self) -> WorkerOptions {
        self.options
    }

    pub fn reducer(&self) -> &Reducer {
        &self.reducer
    }

    /// Present when the function is registered as a map function.
    pub fn aggregator(&self) -> Option<&AggregatorFunction> {
        self.aggregator.as_ref()
    }

    /// Per-job timeout handed to the server at registration; zero means none.
    pub fn function_timeout(&self) -> Duration {
        self.function_timeout
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }

    pub fn validate(&self) -> Result<()> {
        validate_function_name(&self.function_name)?;

        if self.server.host().trim().is_empty() {
            bail!("server host cannot be empty");
        }

        if self.server.port() == 0 {
            bail!("server port must be greater than 0");
        }

        if self.poll_timeout.is_zero() {
            bail!("poll_timeout must be greater than 0");
        }

        if self.ready_timeout.is_zero() {
            bail!("ready_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("server", &self.server)
            .field("function_name", &self.function_name)
            .field("function_arg", &self.function_arg.is_some())
            .field("options", &self.options)
            .field("reducer", &self.reducer)
            .field("aggregator", &self.aggregator.is_some())
            .field("function_timeout", &self.function_timeout)
            .field("poll_timeout", &self.poll_timeout)
            .field("ready_timeout", &self.ready_timeout)
            .finish()
    }
}

#[derive(Default, Clone)]
pub struct WorkerConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    function_name: Option<String>,
    function: Option<WorkerFunction>,
    function_arg: Option<FunctionArg>,
    options: WorkerOptions,
    reducer: Option<Reducer>,
    aggregator: Option<AggregatorFunction>,
    function_timeout: Option<Duration>,
    poll_timeout: Option<Duration>,
    ready_timeout: Option<Duration>,
}

impl WorkerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn server(self, server: &ServerAddress) -> Self {
        self.host(server.host()).port(server.port())
    }

    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    pub fn function(mut self, function: WorkerFunction) -> Self {
        self.function = Some(function);
        self
    }

    pub fn function_arg(mut self, arg: FunctionArg) -> Self {
        self.function_arg = Some(arg);
        self
    }

    pub fn maybe_function_arg(mut self, arg: Option<FunctionArg>) -> Self {
        self.function_arg = arg;
        self
    }

    pub fn options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = Some(reducer);
        self
    }

    pub fn aggregator(mut self, aggregator: AggregatorFunction) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn maybe_aggregator(mut self, aggregator: Option<AggregatorFunction>) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn function_timeout(mut self, timeout: Duration) -> Self {
        self.function_timeout = Some(timeout);
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<WorkerConfig> {
        let params = WorkerConfigParams {
            server: ServerAddress::new(
                self.host
                    .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_owned()),
                self.port.unwrap_or(DEFAULT_SERVER_PORT),
            ),
            function_name: self.function_name.context("function_name is required")?,
            function: self.function.context("function is required")?,
            function_arg: self.function_arg,
            options: self.options,
            reducer: self.reducer.unwrap_or_default(),
            aggregator: self.aggregator,
            function_timeout: self.function_timeout.unwrap_or(Duration::ZERO),
            poll_timeout: self.poll_timeout.unwrap_or(DEFAULT_POLL_TIMEOUT),
            ready_timeout: self.ready_timeout.unwrap_or(DEFAULT_READY_TIMEOUT),
        };

        WorkerConfig::new(params)
    }
}

fn validate_function_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("function_name cannot be empty");
    }

    if name.contains('\0') {
        bail!("function_name {name:?} cannot contain NUL bytes");
    }

    Ok(())
}
