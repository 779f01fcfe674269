//! Worker option flags and server option names.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Server option that asks the job server to forward exceptions raised by a
/// worker function to the submitting client.
pub const EXCEPTIONS_SERVER_OPTION: &str = "exceptions";

/// Set of behaviour flags applied to a worker client.
///
/// The empty set is the default; a worker only calls
/// [`JobWorkerClient::add_options`](crate::JobWorkerClient::add_options) when
/// the set differs from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WorkerOptions(u32);

impl WorkerOptions {
    pub const NONE: Self = Self(0);
    /// A cycle returns immediately instead of waiting for a job.
    pub const NON_BLOCKING: Self = Self(1 << 0);
    /// Jobs are grabbed together with their client-supplied unique id.
    pub const GRAB_UNIQ: Self = Self(1 << 1);
    /// An idle cycle is reported as a timeout error instead of an idle outcome.
    pub const TIMEOUT_RETURN: Self = Self(1 << 2);

    const NAMED: [(Self, &'static str); 3] = [
        (Self::NON_BLOCKING, "non_blocking"),
        (Self::GRAB_UNIQ, "grab_uniq"),
        (Self::TIMEOUT_RETURN, "timeout_return"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_default(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for WorkerOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for WorkerOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Display for WorkerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            return write!(f, "default");
        }

        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}
