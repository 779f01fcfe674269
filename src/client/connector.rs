//! The job worker client seam: how a worker thread reaches a job server.
//!
//! The worker never talks to a server directly. It receives a
//! [`ClientConnector`] by value, moves it onto its own thread, and drives the
//! [`JobWorkerClient`] the connector produces.

use super::function::{AggregatorFunction, FunctionArg, JobFailure, WorkerFunction};
use super::options::WorkerOptions;
use super::reducer::Reducer;
use std::fmt;
use std::time::Duration;

/// Port job servers listen on unless told otherwise.
pub const DEFAULT_SERVER_PORT: u16 = 4730;
pub const DEFAULT_SERVER_HOST: &str = "localhost";

/// Host and port of a job server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address on the default host.
    pub fn localhost(port: u16) -> Self {
        Self::new(DEFAULT_SERVER_HOST, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::localhost(DEFAULT_SERVER_PORT)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Errors surfaced by a [`JobWorkerClient`] or its connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    ConnectionRefused { address: ServerAddress },
    RegistrationRejected { function: String, reason: String },
    Disconnected,
    Timeout,
    Other(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::ConnectionRefused { address } => {
                write!(f, "job server at {address} refused the connection")
            }
            ClientError::RegistrationRejected { function, reason } => {
                write!(f, "registration of function {function} rejected: {reason}")
            }
            ClientError::Disconnected => write!(f, "connection to job server lost"),
            ClientError::Timeout => write!(f, "no job arrived before the poll timeout"),
            ClientError::Other(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Result of one successful poll-and-execute cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// No job arrived within the poll timeout.
    Idle,
    /// A job ran and its callback succeeded.
    Completed { handle: String },
    /// A job ran and its callback reported a failure.
    Failed { handle: String, failure: JobFailure },
}

/// Client-side view of a job server connection used by a single worker.
///
/// Implementations are created and dropped on the worker thread; dropping the
/// client releases its connection.
pub trait JobWorkerClient: Send {
    /// Enables a named server-side option. Returns `false` when the server
    /// does not accept it.
    fn set_server_option(&mut self, option: &str) -> bool;

    /// Registers a plain function. A zero `timeout` means no per-job limit.
    fn add_function(
        &mut self,
        name: &str,
        timeout: Duration,
        function: WorkerFunction,
        arg: Option<FunctionArg>,
    ) -> Result<(), ClientError>;

    /// Registers a map function whose partial results are combined by
    /// `aggregator`.
    fn add_map_function(
        &mut self,
        name: &str,
        timeout: Duration,
        function: WorkerFunction,
        aggregator: AggregatorFunction,
        arg: Option<FunctionArg>,
    ) -> Result<(), ClientError>;

    fn add_options(&mut self, options: WorkerOptions);

    /// Upper bound on how long a single [`work`](Self::work) call may block.
    fn set_timeout(&mut self, timeout: Duration);

    fn set_reducer(&mut self, reducer: Reducer);

    /// Performs one poll-and-execute cycle, invoking the registered callback
    /// at most once.
    fn work(&mut self) -> Result<WorkOutcome, ClientError>;
}

/// Factory for [`JobWorkerClient`]s, invoked on the worker thread.
pub trait ClientConnector: Send + 'static {
    type Client: JobWorkerClient;

    fn connect(&self, address: &ServerAddress) -> Result<Self::Client, ClientError>;
}

impl<F, C> ClientConnector for F
where
    F: Fn(&ServerAddress) -> Result<C, ClientError> + Send + 'static,
    C: JobWorkerClient,
{
    type Client = C;

    fn connect(&self, address: &ServerAddress) -> Result<C, ClientError> {
        self(address)
    }
}
