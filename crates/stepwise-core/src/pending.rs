use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use crate::error::{ExecutionError, Result, StepwiseError};

type Callback<T> = Box<dyn FnOnce(Result<T>) + Send>;

enum Slot<T> {
    Pending {
        callback: Option<Callback<T>>,
        waker: Option<Waker>,
    },
    Resolved(Result<T>),
    Taken,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        // No user code runs under this lock.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, outcome: Result<T>) {
        let mut slot = self.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Pending {
                callback: Some(callback),
                ..
            } => {
                drop(slot);
                callback(outcome);
            }
            Slot::Pending {
                callback: None,
                waker,
            } => {
                *slot = Slot::Resolved(outcome);
                drop(slot);
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
            already => *slot = already,
        }
    }
}

/// Handle to the eventual outcome of one asynchronous unit of work.
///
/// A `PendingResult` is resolved exactly once, through its paired [`Resolver`].
/// The outcome can be consumed in three ways:
///
/// - registering a continuation with [`on_resolve`](Self::on_resolve), which
///   fires on success and on failure alike;
/// - awaiting the handle, since it implements `Future<Output = Result<T>>`;
/// - polling it synchronously with [`try_take`](Self::try_take), after checking
///   [`is_resolved`](Self::is_resolved), [`succeeded`](Self::succeeded) or
///   [`failed`](Self::failed).
///
/// Whichever comes first consumes the outcome; later attempts observe
/// [`ExecutionError::Consumed`].
pub struct PendingResult<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> PendingResult<T> {
    /// Create an unresolved handle together with the resolver that completes it.
    pub fn channel() -> (Resolver<T>, Self) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::Pending {
                callback: None,
                waker: None,
            }),
        });
        (
            Resolver {
                shared: Some(Arc::clone(&shared)),
            },
            Self { shared },
        )
    }

    /// A handle that has already resolved with `outcome`.
    pub fn resolved(outcome: Result<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Resolved(outcome)),
            }),
        }
    }

    /// A handle that has already succeeded with `value`.
    pub fn ok(value: T) -> Self {
        Self::resolved(Ok(value))
    }

    /// A handle that has already failed with `error`.
    pub fn err(error: impl Into<StepwiseError>) -> Self {
        Self::resolved(Err(error.into()))
    }

    /// Whether the outcome is known (including when it was already consumed).
    pub fn is_resolved(&self) -> bool {
        !matches!(*self.shared.lock(), Slot::Pending { .. })
    }

    /// Whether the handle resolved successfully and the value has not been taken yet.
    pub fn succeeded(&self) -> bool {
        matches!(*self.shared.lock(), Slot::Resolved(Ok(_)))
    }

    /// Whether the handle resolved with a failure that has not been taken yet.
    pub fn failed(&self) -> bool {
        matches!(*self.shared.lock(), Slot::Resolved(Err(_)))
    }

    /// Take the outcome if the handle has resolved, without blocking.
    ///
    /// Returns `None` while the work is still in flight.
    pub fn try_take(&self) -> Option<Result<T>> {
        let mut slot = self.shared.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Resolved(outcome) => Some(outcome),
            Slot::Taken => Some(Err(ExecutionError::Consumed.into())),
            pending @ Slot::Pending { .. } => {
                *slot = pending;
                None
            }
        }
    }

    /// Register a continuation invoked with the outcome, success or failure.
    ///
    /// If the handle has already resolved, `f` runs immediately on the calling
    /// thread. Otherwise it runs on whichever thread resolves the handle.
    pub fn on_resolve<F>(self, f: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let mut slot = self.shared.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Pending { .. } => {
                *slot = Slot::Pending {
                    callback: Some(Box::new(f)),
                    waker: None,
                };
            }
            Slot::Resolved(outcome) => {
                drop(slot);
                f(outcome);
            }
            Slot::Taken => {
                drop(slot);
                f(Err(ExecutionError::Consumed.into()));
            }
        }
    }
}

impl<T: Send + 'static> Future for PendingResult<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Resolved(outcome) => Poll::Ready(outcome),
            Slot::Taken => Poll::Ready(Err(ExecutionError::Consumed.into())),
            Slot::Pending { callback, .. } => {
                *slot = Slot::Pending {
                    callback,
                    waker: Some(cx.waker().clone()),
                };
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.shared.lock() {
            Slot::Pending { .. } => "pending",
            Slot::Resolved(Ok(_)) => "succeeded",
            Slot::Resolved(Err(_)) => "failed",
            Slot::Taken => "taken",
        };
        f.debug_struct("PendingResult").field("state", &state).finish()
    }
}

/// Write half of a [`PendingResult`].
///
/// Dropping a resolver without calling [`resolve`](Self::resolve) fails the
/// handle with [`ExecutionError::Dropped`].
pub struct Resolver<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Resolver<T> {
    pub fn resolve(mut self, outcome: Result<T>) {
        if let Some(shared) = self.shared.take() {
            shared.complete(outcome);
        }
    }

    pub fn succeed(self, value: T) {
        self.resolve(Ok(value));
    }

    pub fn fail(self, error: impl Into<StepwiseError>) {
        self.resolve(Err(error.into()));
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.complete(Err(ExecutionError::Dropped.into()));
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}
