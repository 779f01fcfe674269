//! Reducer descriptor passed through to clients that support map-style jobs.

use super::function::{FunctionArg, JobFailure, JobResult};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Invoked once per partial result of a map-style job.
pub type ReducerEachFunction =
    Arc<dyn Fn(&Bytes, Option<&FunctionArg>) -> Result<(), JobFailure> + Send + Sync>;

/// Invoked once with the aggregated result.
pub type ReducerFinalFunction = Arc<dyn Fn(&JobResult, Option<&FunctionArg>) + Send + Sync>;

/// Reducer callbacks plus the context they receive.
///
/// A reducer without an each-function is inactive and is never installed on a
/// client.
#[derive(Clone, Default)]
pub struct Reducer {
    each: Option<ReducerEachFunction>,
    finish: Option<ReducerFinalFunction>,
    context: Option<FunctionArg>,
}

impl Reducer {
    /// Inactive reducer.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<F>(each: F) -> Self
    where
        F: Fn(&Bytes, Option<&FunctionArg>) -> Result<(), JobFailure> + Send + Sync + 'static,
    {
        Self {
            each: Some(Arc::new(each)),
            finish: None,
            context: None,
        }
    }

    pub fn with_final<F>(mut self, finish: F) -> Self
    where
        F: Fn(&JobResult, Option<&FunctionArg>) + Send + Sync + 'static,
    {
        self.finish = Some(Arc::new(finish));
        self
    }

    pub fn with_context(mut self, context: FunctionArg) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_active(&self) -> bool {
        self.each.is_some()
    }

    pub fn each(&self) -> Option<&ReducerEachFunction> {
        self.each.as_ref()
    }

    pub fn finish(&self) -> Option<&ReducerFinalFunction> {
        self.finish.as_ref()
    }

    pub fn context(&self) -> Option<&FunctionArg> {
        self.context.as_ref()
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer")
            .field("each", &self.each.is_some())
            .field("finish", &self.finish.is_some())
            .field("context", &self.context.is_some())
            .finish()
    }
}
