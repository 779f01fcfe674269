use crate::client::ClientError;
use std::fmt;
use std::time::Duration;

/// Setup step of a worker thread, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Connect,
    ServerOption,
    Register,
}

/// Lifecycle failures surfaced by the start and stop operations.
///
/// Public operations return [`anyhow::Result`]; callers that need to branch on
/// the failure kind use `downcast_ref::<WorkerError>()`.
#[derive(Debug)]
pub enum WorkerError {
    /// A setup step failed on the worker thread; the thread has exited.
    Setup {
        stage: SetupStage,
        source: ClientError,
    },
    /// The worker did not report readiness in time; it was asked to shut down.
    ReadinessTimeout { function: String, waited: Duration },
    /// The worker thread panicked.
    Panicked { function: String, message: String },
    /// The worker thread did not exit in time after shutdown was requested.
    StopTimeout { function: String, waited: Duration },
}

impl WorkerError {
    pub(crate) fn setup(stage: SetupStage, source: ClientError) -> Self {
        WorkerError::Setup { stage, source }
    }

    pub fn stage(&self) -> Option<SetupStage> {
        match self {
            WorkerError::Setup { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Setup { stage, source } => {
                write!(f, "worker setup failed during {stage:?}: {source}")
            }
            WorkerError::ReadinessTimeout { function, waited } => {
                write!(f, "worker {function} was not ready after {waited:?}")
            }
            WorkerError::Panicked { function, message } => {
                write!(f, "worker {function} panicked: {message}")
            }
            WorkerError::StopTimeout { function, waited } => {
                write!(f, "worker {function} did not stop within {waited:?}")
            }
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Setup { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
