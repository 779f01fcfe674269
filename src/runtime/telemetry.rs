use crate::client::{ClientError, WorkOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a fmt subscriber that prints thread names, so output from each
/// `worker-<function>` thread can be told apart.
///
/// `RUST_LOG` selects the filter (default `info`). Repeated calls are no-ops.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Counters shared between a worker thread and its handle.
#[derive(Default, Debug)]
pub struct WorkerStats {
    cycles: AtomicU64,
    idle_cycles: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    cycle_errors: AtomicU64,
}

impl WorkerStats {
    /// Records the outcome of one poll-and-execute cycle.
    pub fn record_cycle(&self, outcome: &Result<WorkOutcome, ClientError>) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Ok(WorkOutcome::Idle) => &self.idle_cycles,
            Ok(WorkOutcome::Completed { .. }) => &self.jobs_completed,
            Ok(WorkOutcome::Failed { .. }) => &self.jobs_failed,
            Err(_) => &self.cycle_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            idle_cycles: self.idle_cycles.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            cycle_errors: self.cycle_errors.load(Ordering::Relaxed),
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    pub cycles: u64,
    pub idle_cycles: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub cycle_errors: u64,
}

impl WorkerStatsSnapshot {
    /// Jobs that reached a callback, successful or not.
    pub fn jobs_executed(&self) -> u64 {
        self.jobs_completed.saturating_add(self.jobs_failed)
    }
}
