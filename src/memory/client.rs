use super::{QueuedJob, Registration, RegistrationKind, ServerInner, ServerState};
use crate::client::{
    AggregatorFunction, ClientError, FunctionArg, Job, JobResult, JobWorkerClient, Reducer,
    WorkOutcome, WorkerFunction, WorkerOptions, EXCEPTIONS_SERVER_OPTION,
};
use std::fmt;
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

struct RegisteredFunction {
    name: String,
    function: WorkerFunction,
    aggregator: Option<AggregatorFunction>,
    arg: Option<FunctionArg>,
}

/// Connection to a [`MemoryJobServer`](super::MemoryJobServer).
///
/// Without [`set_timeout`](JobWorkerClient::set_timeout), or with a timeout
/// too large to represent as a deadline, a cycle blocks until a job arrives or
/// the server shuts down.
pub struct MemoryWorkerClient {
    server: Arc<ServerInner>,
    functions: Vec<RegisteredFunction>,
    options: WorkerOptions,
    timeout: Option<Duration>,
    reducer: Option<Reducer>,
    exceptions: bool,
}

impl MemoryWorkerClient {
    pub(super) fn new(server: Arc<ServerInner>) -> Self {
        Self {
            server,
            functions: Vec::new(),
            options: WorkerOptions::NONE,
            timeout: None,
            reducer: None,
            exceptions: false,
        }
    }

    /// Names of the functions registered on this connection.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }

    pub fn options(&self) -> WorkerOptions {
        self.options
    }

    fn register(
        &mut self,
        name: &str,
        timeout: Duration,
        kind: RegistrationKind,
        registered: RegisteredFunction,
    ) -> Result<(), ClientError> {
        if self.functions.iter().any(|f| f.name == name) {
            return Err(ClientError::RegistrationRejected {
                function: name.to_owned(),
                reason: "function already registered on this connection".into(),
            });
        }

        let mut state = self.server.lock();
        if state.closed {
            return Err(ClientError::Disconnected);
        }
        state.registrations.push(Registration {
            function: name.to_owned(),
            kind,
            timeout,
        });
        drop(state);

        self.functions.push(registered);
        Ok(())
    }

    fn take_job(&self, state: &mut ServerState) -> Option<(usize, QueuedJob)> {
        self.functions.iter().enumerate().find_map(|(index, f)| {
            state
                .queues
                .get_mut(&f.name)
                .and_then(|queue| queue.pop_front())
                .map(|job| (index, job))
        })
    }

    fn idle(&self) -> Result<WorkOutcome, ClientError> {
        if self.options.contains(WorkerOptions::TIMEOUT_RETURN) {
            Err(ClientError::Timeout)
        } else {
            Ok(WorkOutcome::Idle)
        }
    }

    fn execute(&self, registered: &RegisteredFunction, job: &Job) -> JobResult {
        let arg = registered.arg.as_ref();
        let partial = (registered.function)(job, arg)?;

        let Some(aggregator) = registered.aggregator.as_ref() else {
            return Ok(partial);
        };

        let partials = [partial];
        if let Some(reducer) = self.reducer.as_ref() {
            if let Some(each) = reducer.each() {
                for part in &partials {
                    each(part, reducer.context())?;
                }
            }
        }

        let aggregated = aggregator(&partials, arg);
        if let Some(reducer) = self.reducer.as_ref() {
            if let Some(finish) = reducer.finish() {
                finish(&aggregated, reducer.context());
            }
        }
        aggregated
    }
}

impl fmt::Debug for MemoryWorkerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWorkerClient")
            .field("functions", &self.functions().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("timeout", &self.timeout)
            .field("exceptions", &self.exceptions)
            .finish_non_exhaustive()
    }
}

impl JobWorkerClient for MemoryWorkerClient {
    fn set_server_option(&mut self, option: &str) -> bool {
        if option == EXCEPTIONS_SERVER_OPTION {
            self.exceptions = true;
            true
        } else {
            false
        }
    }

    fn add_function(
        &mut self,
        name: &str,
        timeout: Duration,
        function: WorkerFunction,
        arg: Option<FunctionArg>,
    ) -> Result<(), ClientError> {
        let registered = RegisteredFunction {
            name: name.to_owned(),
            function,
            aggregator: None,
            arg,
        };
        self.register(name, timeout, RegistrationKind::Plain, registered)
    }

    fn add_map_function(
        &mut self,
        name: &str,
        timeout: Duration,
        function: WorkerFunction,
        aggregator: AggregatorFunction,
        arg: Option<FunctionArg>,
    ) -> Result<(), ClientError> {
        let registered = RegisteredFunction {
            name: name.to_owned(),
            function,
            aggregator: Some(aggregator),
            arg,
        };
        self.register(name, timeout, RegistrationKind::Map, registered)
    }

    fn add_options(&mut self, options: WorkerOptions) {
        self.options |= options;
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    fn set_reducer(&mut self, reducer: Reducer) {
        self.reducer = Some(reducer);
    }

    fn work(&mut self) -> Result<WorkOutcome, ClientError> {
        let server = Arc::clone(&self.server);
        // A timeout past the representable range means no deadline.
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let non_blocking = self.options.contains(WorkerOptions::NON_BLOCKING);

        let mut state = server.lock();
        let (index, queued) = loop {
            if state.closed {
                drop(state);
                // Stands in for a reconnect attempt that fails after the poll timeout.
                if let (Some(deadline), false) = (deadline, non_blocking) {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                }
                return Err(ClientError::Disconnected);
            }
            if let Some(found) = self.take_job(&mut state) {
                break found;
            }
            if non_blocking {
                return self.idle();
            }

            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return self.idle();
                    }
                    server
                        .job_ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => server
                    .job_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        };
        drop(state);

        let registered = &self.functions[index];
        let mut job = Job::new(queued.handle, registered.name.as_str(), queued.workload);
        if self.options.contains(WorkerOptions::GRAB_UNIQ) {
            if let Some(unique) = queued.unique {
                job = job.with_unique(unique);
            }
        }

        let result = self.execute(registered, &job);
        let outcome = match &result {
            Ok(_) => WorkOutcome::Completed {
                handle: job.handle().to_owned(),
            },
            Err(failure) => WorkOutcome::Failed {
                handle: job.handle().to_owned(),
                failure: failure.clone(),
            },
        };
        server.complete(job.handle(), &registered.name, result, self.exceptions);
        Ok(outcome)
    }
}

impl Drop for MemoryWorkerClient {
    fn drop(&mut self) {
        self.server.disconnect();
    }
}
