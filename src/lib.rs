pub mod client;
pub mod memory;
pub mod runtime;
pub mod worker;

pub use client::{
    aggregator_fn, worker_fn, AggregatorFunction, ClientConnector, ClientError, FunctionArg, Job,
    JobFailure, JobResult, JobWorkerClient, Reducer, ServerAddress, WorkOutcome, WorkerFunction,
    WorkerOptions, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, EXCEPTIONS_SERVER_OPTION,
};
pub use memory::{
    JobReport, JobStatus, MemoryJobServer, MemoryWorkerClient, Registration, RegistrationKind,
};
pub use runtime::telemetry::{init_tracing, WorkerStats, WorkerStatsSnapshot};
pub use worker::{
    start_worker, start_worker_with_reducer, SetupStage, WorkerConfig, WorkerConfigBuilder,
    WorkerError, WorkerHandle, WorkerReport, WorkerState,
};
