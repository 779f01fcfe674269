//! Job worker client abstraction: the trait a worker drives, the connector
//! that creates it, and the callback, option and reducer types it accepts.

pub mod connector;
pub mod function;
pub mod options;
pub mod reducer;

pub use connector::{
    ClientConnector, ClientError, JobWorkerClient, ServerAddress, WorkOutcome,
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
};
pub use function::{
    aggregator_fn, worker_fn, AggregatorFunction, FunctionArg, Job, JobFailure, JobResult,
    WorkerFunction,
};
pub use options::{WorkerOptions, EXCEPTIONS_SERVER_OPTION};
pub use reducer::{Reducer, ReducerEachFunction, ReducerFinalFunction};
