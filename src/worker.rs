//! Worker thread lifecycle split across focused submodules:
//! - `config`: validated per-worker configuration and its builder
//! - `error`: setup stages and lifecycle errors
//! - `state`: monotonic lifecycle state
//! - `runner`: the thread body (setup, readiness, poll loop, release)
//! - `handle`: caller-side handle with the spawn and stop operations
//! - `start`: the start factories
//! - `tests`: lifecycle tests against a recording client

mod config;
mod error;
mod handle;
mod runner;
mod start;
mod state;


pub use config::{
    WorkerConfig, WorkerConfigBuilder, WorkerConfigParams, DEFAULT_POLL_TIMEOUT,
    DEFAULT_READY_TIMEOUT,
};
pub use error::{SetupStage, WorkerError};
pub use handle::{WorkerHandle, WorkerReport};
pub use start::{start_worker, start_worker_with_reducer};
pub use state::WorkerState;
