use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a worker thread. States only ever advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WorkerState {
    /// Handle allocated, thread not yet running.
    Created = 0,
    /// Thread running setup or the poll loop.
    Running = 1,
    /// Shutdown requested; the thread finishes its current cycle.
    ShuttingDown = 2,
    /// Thread released its client and exited its body.
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Created,
            1 => WorkerState::Running,
            2 => WorkerState::ShuttingDown,
            _ => WorkerState::Stopped,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Created => "created",
            WorkerState::Running => "running",
            WorkerState::ShuttingDown => "shutting_down",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Atomic holder for a [`WorkerState`] that refuses backwards transitions.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Created as u8))
    }

    pub(crate) fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless the cell is already at or past it. Returns the
    /// state observed before the call.
    pub(crate) fn advance(&self, next: WorkerState) -> WorkerState {
        WorkerState::from_u8(self.0.fetch_max(next as u8, Ordering::AcqRel))
    }
}
