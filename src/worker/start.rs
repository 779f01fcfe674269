use super::config::WorkerConfig;
use super::handle::WorkerHandle;
use crate::client::{
    AggregatorFunction, ClientConnector, FunctionArg, Reducer, WorkerFunction, WorkerOptions,
};
use anyhow::Result;

/// Starts a worker for a plain function on the default host at `port`.
///
/// Returns once the worker is connected and registered; see
/// [`WorkerHandle::spawn`] for the failure cases.
pub fn start_worker<C: ClientConnector>(
    connector: C,
    port: u16,
    function_name: &str,
    function: WorkerFunction,
    arg: Option<FunctionArg>,
    options: WorkerOptions,
) -> Result<WorkerHandle> {
    start_worker_with_reducer(
        connector,
        port,
        function_name,
        function,
        arg,
        options,
        Reducer::none(),
        None,
    )
}

/// Starts a worker with a reducer descriptor and, optionally, an aggregator.
///
/// Supplying an aggregator registers the function as a map function; the
/// reducer is only installed when it has an each-function.
#[allow(clippy::too_many_arguments)]
pub fn start_worker_with_reducer<C: ClientConnector>(
    connector: C,
    port: u16,
    function_name: &str,
    function: WorkerFunction,
    arg: Option<FunctionArg>,
    options: WorkerOptions,
    reducer: Reducer,
    aggregator: Option<AggregatorFunction>,
) -> Result<WorkerHandle> {
    let config = WorkerConfig::builder()
        .port(port)
        .function_name(function_name)
        .function(function)
        .maybe_function_arg(arg)
        .options(options)
        .reducer(reducer)
        .maybe_aggregator(aggregator)
        .build()?;

    WorkerHandle::spawn(connector, config)
}
