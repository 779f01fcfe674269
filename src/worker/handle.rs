use super::config::WorkerConfig;
use super::error::{panic_message, WorkerError};
use super::runner::{WorkerRunner, WorkerShared};
use super::state::WorkerState;
use crate::client::{ClientConnector, ServerAddress};
use crate::runtime::telemetry::WorkerStatsSnapshot;
use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Caller-side handle to one running worker thread.
///
/// Stopping consumes the handle, so a worker can only be stopped once. A
/// handle dropped without being stopped requests shutdown and joins the
/// thread itself.
#[derive(Debug)]
pub struct WorkerHandle {
    function_name: String,
    server: ServerAddress,
    shutdown: CancellationToken,
    shared: Arc<WorkerShared>,
    thread: Option<JoinHandle<()>>,
}

/// Final view of a worker returned by the stop operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub function_name: String,
    pub state: WorkerState,
    pub stats: WorkerStatsSnapshot,
}

impl WorkerHandle {
    /// Spawns a worker thread for `config` and waits until it has connected,
    /// registered its function and applied its settings.
    ///
    /// Fails if the thread cannot be spawned, if any setup step fails on the
    /// worker thread, or if readiness is not reported within
    /// [`WorkerConfig::ready_timeout`].
    pub fn spawn<C: ClientConnector>(connector: C, config: WorkerConfig) -> Result<Self> {
        let function_name = config.function_name().to_owned();
        let server = config.server().clone();
        let ready_timeout = config.ready_timeout();

        let shutdown = CancellationToken::new();
        let shared = Arc::new(WorkerShared::new());
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let runner = WorkerRunner::new(
            config,
            connector,
            shutdown.clone(),
            Arc::clone(&shared),
            ready_tx,
        );

        let thread = thread::Builder::new()
            .name(format!("worker-{function_name}"))
            .spawn(move || runner.run())
            .with_context(|| format!("failed to spawn worker thread for {function_name}"))?;

        let mut handle = Self {
            function_name,
            server,
            shutdown,
            shared,
            thread: Some(thread),
        };
        handle.await_ready(ready_rx, ready_timeout)?;
        Ok(handle)
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state.get()
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Clone of the worker's shutdown token. Cancelling it makes the worker
    /// leave its loop; [`stop`](Self::stop) is still needed to join it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Requests shutdown and blocks until the worker thread has exited.
    ///
    /// Returns within one poll timeout plus scheduling slack unless a callback
    /// blocks; use [`stop_timeout`](Self::stop_timeout) to bound the wait.
    pub fn stop(mut self) -> Result<WorkerReport> {
        self.request_shutdown();
        self.join_thread()?;
        Ok(self.report())
    }

    /// Like [`stop`](Self::stop), but gives up after `limit`. On timeout the
    /// thread is detached and exits whenever its current cycle returns. A
    /// `limit` too large to add to the current instant behaves like `stop`.
    pub fn stop_timeout(mut self, limit: Duration) -> Result<WorkerReport> {
        self.request_shutdown();
        let Some(deadline) = Instant::now().checked_add(limit) else {
            return self.stop();
        };

        while !self.thread.as_ref().map_or(true, JoinHandle::is_finished) {
            if Instant::now() >= deadline {
                self.thread.take();
                tracing::warn!(
                    function = %self.function_name,
                    waited = ?limit,
                    "worker did not stop in time; detaching thread"
                );
                return Err(WorkerError::StopTimeout {
                    function: self.function_name.clone(),
                    waited: limit,
                }
                .into());
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }

        self.join_thread()?;
        Ok(self.report())
    }

    /// Runs [`stop`](Self::stop) on the blocking pool so async callers do not
    /// stall their runtime while the worker finishes its cycle.
    pub async fn stop_async(self) -> Result<WorkerReport> {
        tokio::task::spawn_blocking(move || self.stop())
            .await
            .context("worker stop task failed")?
    }

    fn request_shutdown(&self) {
        self.shutdown.cancel();
        self.shared.state.advance(WorkerState::ShuttingDown);
    }

    fn await_ready(
        &mut self,
        ready_rx: Receiver<Result<(), WorkerError>>,
        timeout: Duration,
    ) -> Result<()> {
        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {
                tracing::debug!(function = %self.function_name, server = %self.server, "worker started");
                Ok(())
            }
            Ok(Err(err)) => {
                // The runner returns right after reporting the failure.
                self.join_thread()?;
                Err(err.into())
            }
            Err(RecvTimeoutError::Timeout) => {
                self.request_shutdown();
                self.thread.take();
                tracing::warn!(
                    function = %self.function_name,
                    waited = ?timeout,
                    "worker not ready in time; shutdown requested and thread detached"
                );
                Err(WorkerError::ReadinessTimeout {
                    function: self.function_name.clone(),
                    waited: timeout,
                }
                .into())
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.join_thread()?;
                Err(anyhow!(
                    "worker {} exited before reporting readiness",
                    self.function_name
                ))
            }
        }
    }

    fn join_thread(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        thread.join().map_err(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(
                function = %self.function_name,
                panic = %message,
                "worker thread panicked"
            );
            WorkerError::Panicked {
                function: self.function_name.clone(),
                message,
            }
            .into()
        })
    }

    fn report(&self) -> WorkerReport {
        WorkerReport {
            function_name: self.function_name.clone(),
            state: self.state(),
            stats: self.stats(),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.thread.is_none() {
            return;
        }

        tracing::warn!(
            function = %self.function_name,
            "worker handle dropped without stop; stopping worker"
        );
        self.request_shutdown();
        if let Err(err) = self.join_thread() {
            tracing::warn!(error = %err, "worker exited abnormally during drop");
        }
    }
}
