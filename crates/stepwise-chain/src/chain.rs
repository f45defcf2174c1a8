use std::panic::{self, AssertUnwindSafe};

use stepwise_core::error::{ChainFailure, ExecutionError, Result, StepwiseError};
use stepwise_core::pending::PendingResult;

/// Run `continuation` once `primary` resolves, whether it succeeded or failed.
///
/// The returned handle resolves with:
///
/// - the continuation's value, if both succeeded;
/// - the primary's original error, if the primary failed and the continuation
///   succeeded (the continuation runs for its side effects only and never
///   masks the failure);
/// - a [`ChainFailure`] carrying the continuation's error if the continuation
///   failed. When the primary had failed as well, its error is kept in
///   [`ChainFailure::primary`].
///
/// `continuation` is invoked exactly once. A panic raised while invoking it is
/// reported as a `ChainFailure` wrapping [`ExecutionError::Panicked`].
pub fn chain_function<T, U, F>(primary: PendingResult<T>, continuation: F) -> PendingResult<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnOnce() -> PendingResult<U> + Send + 'static,
{
    let (resolver, chained) = PendingResult::channel();

    primary.on_resolve(move |outcome| {
        let primary_err = outcome.err();
        if let Some(err) = &primary_err {
            tracing::debug!(error = %err, "running continuation after primary failure");
        }

        let next = match panic::catch_unwind(AssertUnwindSafe(continuation)) {
            Ok(next) => next,
            Err(payload) => PendingResult::err(ExecutionError::from_panic(payload)),
        };
        next.on_resolve(move |outcome| resolver.resolve(settle(primary_err, outcome)));
    });

    chained
}

fn settle<U>(primary: Option<StepwiseError>, continuation: Result<U>) -> Result<U> {
    match (primary, continuation) {
        (None, Ok(value)) => Ok(value),
        (Some(primary), Ok(_)) => Err(primary),
        (primary, Err(source)) => {
            tracing::warn!(error = %source, "chained continuation failed");
            Err(ChainFailure {
                source: Box::new(source),
                primary: primary.map(Box::new),
            }
            .into())
        }
    }
}

/// Extension trait providing `.chain()` on [`PendingResult`].
pub trait ChainExt {
    /// Method form of [`chain_function`].
    fn chain<U, F>(self, continuation: F) -> PendingResult<U>
    where
        U: Send + 'static,
        F: FnOnce() -> PendingResult<U> + Send + 'static;
}

impl<T: Send + 'static> ChainExt for PendingResult<T> {
    fn chain<U, F>(self, continuation: F) -> PendingResult<U>
    where
        U: Send + 'static,
        F: FnOnce() -> PendingResult<U> + Send + 'static,
    {
        chain_function(self, continuation)
    }
}
