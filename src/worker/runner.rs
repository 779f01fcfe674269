//! Body of a worker thread: setup, readiness report, poll loop, release.

use super::config::WorkerConfig;
use super::error::{SetupStage, WorkerError};
use super::state::{StateCell, WorkerState};
use crate::client::{ClientConnector, ClientError, JobWorkerClient, EXCEPTIONS_SERVER_OPTION};
use crate::runtime::telemetry::WorkerStats;
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) type ReadySender = SyncSender<Result<(), WorkerError>>;

/// State shared between a worker thread and its handle.
#[derive(Debug)]
pub(crate) struct WorkerShared {
    pub(crate) state: StateCell,
    pub(crate) stats: WorkerStats,
}

impl WorkerShared {
    pub(crate) fn new() -> Self {
        Self {
            state: StateCell::new(),
            stats: WorkerStats::default(),
        }
    }
}

pub(crate) struct WorkerRunner<C: ClientConnector> {
    config: WorkerConfig,
    connector: C,
    shutdown: CancellationToken,
    shared: Arc<WorkerShared>,
    ready_tx: ReadySender,
}

impl<C: ClientConnector> WorkerRunner<C> {
    pub(crate) fn new(
        config: WorkerConfig,
        connector: C,
        shutdown: CancellationToken,
        shared: Arc<WorkerShared>,
        ready_tx: ReadySender,
    ) -> Self {
        Self {
            config,
            connector,
            shutdown,
            shared,
            ready_tx,
        }
    }

    #[tracing::instrument(
        name = "worker",
        skip_all,
        fields(function = %self.config.function_name(), server = %self.config.server())
    )]
    pub(crate) fn run(self) {
        // Declared first so it drops last: the client and config are gone
        // before the state reads Stopped.
        let _exit = ExitGuard(Arc::clone(&self.shared));

        let Self {
            config,
            connector,
            shutdown,
            shared,
            ready_tx,
        } = self;

        shared.state.advance(WorkerState::Running);

        let client = match setup(&connector, &config) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(stage = ?err.stage(), error = %err, "worker setup failed");
                let _ = ready_tx.send(Err(err));
                return;
            }
        };

        // The starter may already have given up waiting.
        let _ = ready_tx.send(Ok(()));
        drop(ready_tx);
        tracing::info!(
            poll_timeout = ?config.poll_timeout(),
            map = config.aggregator().is_some(),
            "worker ready"
        );

        poll_until_cancelled(client, &shutdown, &shared.stats);

        let stats = shared.stats.snapshot();
        tracing::info!(
            cycles = stats.cycles,
            jobs_completed = stats.jobs_completed,
            jobs_failed = stats.jobs_failed,
            cycle_errors = stats.cycle_errors,
            "worker loop exited"
        );
    }
}

/// Connects, registers the function and applies the configured client
/// settings, in that order.
fn setup<C: ClientConnector>(
    connector: &C,
    config: &WorkerConfig,
) -> Result<C::Client, WorkerError> {
    let mut client = connector
        .connect(config.server())
        .map_err(|err| WorkerError::setup(SetupStage::Connect, err))?;

    if !client.set_server_option(EXCEPTIONS_SERVER_OPTION) {
        return Err(WorkerError::setup(
            SetupStage::ServerOption,
            ClientError::Other(format!(
                "server rejected option {EXCEPTIONS_SERVER_OPTION}"
            )),
        ));
    }

    let name = config.function_name();
    let timeout = config.function_timeout();
    let function = Arc::clone(config.function());
    let arg = config.function_arg().cloned();
    let registered = match config.aggregator() {
        Some(aggregator) => {
            client.add_map_function(name, timeout, function, Arc::clone(aggregator), arg)
        }
        None => client.add_function(name, timeout, function, arg),
    };
    registered.map_err(|err| WorkerError::setup(SetupStage::Register, err))?;

    if !config.options().is_default() {
        client.add_options(config.options());
    }

    client.set_timeout(config.poll_timeout());

    if config.reducer().is_active() {
        client.set_reducer(config.reducer().clone());
    }

    Ok(client)
}

/// Runs cycles until shutdown is requested. Cycle failures are counted and
/// otherwise ignored; only the token ends the loop.
fn poll_until_cancelled<W: JobWorkerClient>(
    mut client: W,
    shutdown: &CancellationToken,
    stats: &WorkerStats,
) {
    while !shutdown.is_cancelled() {
        let outcome = client.work();
        stats.record_cycle(&outcome);
    }

    drop(client);
    tracing::debug!("job worker client released");
}

struct ExitGuard(Arc<WorkerShared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("worker thread unwinding after panic");
        }
        self.0.state.advance(WorkerState::Stopped);
    }
}
