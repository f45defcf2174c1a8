use std::panic::{self, AssertUnwindSafe};

use tokio::runtime::Handle;

use crate::error::{ExecutionError, Result};
use crate::pending::PendingResult;

/// Runs a unit of work off the caller's flow of control and reports its
/// outcome through a [`PendingResult`].
///
/// Implementations must never let a failure escape synchronously: errors
/// returned by `work` and panics raised inside it both resolve the handle with
/// a failure.
pub trait WorkerContext: Send + Sync {
    fn run_async<T, F>(&self, work: F) -> PendingResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static;
}

/// Invoke `work`, turning a panic into an `ExecutionError::Panicked` failure.
fn run_caught<T>(work: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let err = ExecutionError::from_panic(payload);
            tracing::error!(error = %err, "worker call panicked");
            Err(err.into())
        }
    }
}

/// Runs work synchronously on the calling thread.
///
/// Every handle it returns is already resolved, which makes sequences driven
/// by it fully deterministic. Mostly useful in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineContext;

impl WorkerContext for InlineContext {
    fn run_async<T, F>(&self, work: F) -> PendingResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        PendingResult::resolved(run_caught(work))
    }
}

/// Dispatches work onto the blocking thread pool of a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioContext {
    handle: Handle,
}

impl TokioContext {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| ExecutionError::NoRuntime(e.to_string()).into())
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl WorkerContext for TokioContext {
    fn run_async<T, F>(&self, work: F) -> PendingResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (resolver, pending) = PendingResult::channel();
        // A runtime that is shutting down drops the closure, and with it the
        // resolver, which fails the handle with `Dropped`.
        let _join = self
            .handle
            .spawn_blocking(move || resolver.resolve(run_caught(work)));
        pending
    }
}
