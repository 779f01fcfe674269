//! Job payloads and the callback signatures a worker registers with its client.

use bytes::Bytes;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque argument handed to a callback on every invocation.
pub type FunctionArg = Arc<dyn Any + Send + Sync>;

/// Outcome of a single callback invocation.
pub type JobResult = Result<Bytes, JobFailure>;

/// Callback executed for each job of the registered function.
pub type WorkerFunction = Arc<dyn Fn(&Job, Option<&FunctionArg>) -> JobResult + Send + Sync>;

/// Callback that folds the partial results of a map-style job into one result.
pub type AggregatorFunction =
    Arc<dyn Fn(&[Bytes], Option<&FunctionArg>) -> JobResult + Send + Sync>;

/// Wraps a closure as a [`WorkerFunction`].
pub fn worker_fn<F>(function: F) -> WorkerFunction
where
    F: Fn(&Job, Option<&FunctionArg>) -> JobResult + Send + Sync + 'static,
{
    Arc::new(function)
}

/// Wraps a closure as an [`AggregatorFunction`].
pub fn aggregator_fn<F>(function: F) -> AggregatorFunction
where
    F: Fn(&[Bytes], Option<&FunctionArg>) -> JobResult + Send + Sync + 'static,
{
    Arc::new(function)
}

/// A unit of work claimed from the job server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    handle: String,
    function_name: String,
    unique: Option<String>,
    workload: Bytes,
}

impl Job {
    pub fn new(
        handle: impl Into<String>,
        function_name: impl Into<String>,
        workload: impl Into<Bytes>,
    ) -> Self {
        Self {
            handle: handle.into(),
            function_name: function_name.into(),
            unique: None,
            workload: workload.into(),
        }
    }

    pub fn with_unique(mut self, unique: impl Into<String>) -> Self {
        self.unique = Some(unique.into());
        self
    }

    /// Server-assigned job handle.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Name of the function the job was submitted for.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Client-supplied unique id, only present when the worker grabs unique ids.
    pub fn unique(&self) -> Option<&str> {
        self.unique.as_deref()
    }

    pub fn workload(&self) -> &Bytes {
        &self.workload
    }
}

/// Failure reported by a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// Plain failure with no detail.
    Fail,
    /// Failure carrying a message that the server forwards to the submitter
    /// when exception reporting is enabled.
    Exception(String),
}

impl JobFailure {
    pub fn exception(message: impl Into<String>) -> Self {
        JobFailure::Exception(message.into())
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFailure::Fail => write!(f, "job failed"),
            JobFailure::Exception(message) => write!(f, "job raised exception: {message}"),
        }
    }
}

impl std::error::Error for JobFailure {}
