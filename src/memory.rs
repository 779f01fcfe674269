//! In-process job server double.
//!
//! [`MemoryJobServer`] queues jobs per function name and hands them to the
//! [`MemoryWorkerClient`]s connected to it. It is a [`ClientConnector`], so it
//! can be passed straight to the start factories. There is no wire protocol:
//! "connecting" only checks the port and bumps a connection counter, which the
//! client decrements when it is dropped.

mod client;

pub use client::MemoryWorkerClient;

use crate::client::{ClientConnector, ClientError, JobFailure, JobResult, ServerAddress};
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How a function was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    Plain,
    Map,
}

/// One function registration seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub function: String,
    pub kind: RegistrationKind,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed(Bytes),
    Failed,
    /// Only reported when the worker enabled exception forwarding.
    Exception(String),
}

/// Final state of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub function: String,
    pub status: JobStatus,
    /// Name of the thread that ran the job.
    pub worker: Option<String>,
}

#[derive(Clone)]
pub struct MemoryJobServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    port: u16,
    state: Mutex<ServerState>,
    job_ready: Condvar,
    result_ready: Condvar,
    next_handle: AtomicU64,
}

#[derive(Default)]
struct ServerState {
    queues: HashMap<String, VecDeque<QueuedJob>>,
    results: HashMap<String, JobReport>,
    registrations: Vec<Registration>,
    connections: usize,
    closed: bool,
}

struct QueuedJob {
    handle: String,
    unique: Option<String>,
    workload: Bytes,
}

impl ServerInner {
    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, handle: &str, function: &str, result: JobResult, exceptions: bool) {
        let status = match result {
            Ok(payload) => JobStatus::Completed(payload),
            Err(JobFailure::Exception(message)) if exceptions => JobStatus::Exception(message),
            Err(_) => JobStatus::Failed,
        };
        let report = JobReport {
            function: function.to_owned(),
            status,
            worker: std::thread::current().name().map(str::to_owned),
        };

        self.lock().results.insert(handle.to_owned(), report);
        self.result_ready.notify_all();
    }

    fn disconnect(&self) {
        let mut state = self.lock();
        state.connections = state.connections.saturating_sub(1);
    }
}

impl MemoryJobServer {
    pub fn new(port: u16) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                port,
                state: Mutex::new(ServerState::default()),
                job_ready: Condvar::new(),
                result_ready: Condvar::new(),
                next_handle: AtomicU64::new(1),
            }),
        }
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub fn address(&self) -> ServerAddress {
        ServerAddress::localhost(self.inner.port)
    }

    /// Queues a job and returns its handle.
    pub fn submit(&self, function: &str, workload: impl Into<Bytes>) -> String {
        self.enqueue(function, None, workload.into())
    }

    /// Queues a job carrying a client-supplied unique id.
    pub fn submit_unique(
        &self,
        function: &str,
        unique: impl Into<String>,
        workload: impl Into<Bytes>,
    ) -> String {
        self.enqueue(function, Some(unique.into()), workload.into())
    }

    fn enqueue(&self, function: &str, unique: Option<String>, workload: Bytes) -> String {
        let id = self.inner.next_handle.fetch_add(1, Ordering::Relaxed);
        let handle = format!("H:memory:{id}");
        self.inner
            .lock()
            .queues
            .entry(function.to_owned())
            .or_default()
            .push_back(QueuedJob {
                handle: handle.clone(),
                unique,
                workload,
            });
        self.inner.job_ready.notify_all();
        handle
    }

    /// Jobs for `function` not yet claimed by a worker.
    pub fn pending_jobs(&self, function: &str) -> usize {
        self.inner
            .lock()
            .queues
            .get(function)
            .map_or(0, VecDeque::len)
    }

    pub fn result(&self, handle: &str) -> Option<JobReport> {
        self.inner.lock().results.get(handle).cloned()
    }

    /// Blocks until the job identified by `handle` has finished or `timeout`
    /// elapses. A timeout too large to add to the current instant waits
    /// without a bound.
    pub fn wait_for_result(&self, handle: &str, timeout: Duration) -> Option<JobReport> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.inner.lock();
        loop {
            if let Some(report) = state.results.get(handle) {
                return Some(report.clone());
            }

            let result_ready = &self.inner.result_ready;
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    result_ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => result_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Every registration made against this server, in order.
    pub fn registrations(&self) -> Vec<Registration> {
        self.inner.lock().registrations.clone()
    }

    /// Clients currently connected (created and not yet dropped).
    pub fn active_connections(&self) -> usize {
        self.inner.lock().connections
    }

    /// Refuses new connections and fails every subsequent cycle of connected
    /// clients with [`ClientError::Disconnected`].
    pub fn shutdown(&self) {
        self.inner.lock().closed = true;
        self.inner.job_ready.notify_all();
        self.inner.result_ready.notify_all();
    }
}

impl fmt::Debug for MemoryJobServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryJobServer")
            .field("port", &self.inner.port)
            .field("connections", &self.active_connections())
            .finish()
    }
}

impl ClientConnector for MemoryJobServer {
    type Client = MemoryWorkerClient;

    fn connect(&self, address: &ServerAddress) -> Result<MemoryWorkerClient, ClientError> {
        let mut state = self.inner.lock();
        if state.closed || address.port() != self.inner.port {
            return Err(ClientError::ConnectionRefused {
                address: address.clone(),
            });
        }
        state.connections += 1;
        drop(state);

        Ok(MemoryWorkerClient::new(Arc::clone(&self.inner)))
    }
}
