use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use proptest::prelude::*;

use stepwise_core::context::{InlineContext, WorkerContext};
use stepwise_core::error::{ExecutionError, StepwiseError};
use stepwise_core::pending::PendingResult;

// ---------------------------------------------------------------------------
// 1. A continuation fires exactly once with the resolved outcome, whether it
//    was registered before or after resolution, on this thread or another.
// ---------------------------------------------------------------------------
proptest! {
    #[test]
    fn continuation_fires_once(
        value in any::<i64>(),
        succeed in any::<bool>(),
        register_first in any::<bool>(),
        from_thread in any::<bool>(),
    ) {
        let (resolver, pending) = PendingResult::<i64>::channel();
        let fired = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let resolve = move || {
            if succeed {
                resolver.succeed(value);
            } else {
                resolver.fail(StepwiseError::Other(value.to_string()));
            }
        };

        let counter = Arc::clone(&fired);
        let register = move || {
            pending.on_resolve(move |outcome| {
                counter.fetch_add(1, Ordering::SeqCst);
                tx.send(outcome).unwrap();
            });
        };

        if register_first {
            register();
            if from_thread {
                std::thread::spawn(resolve).join().unwrap();
            } else {
                resolve();
            }
        } else {
            if from_thread {
                std::thread::spawn(resolve).join().unwrap();
            } else {
                resolve();
            }
            register();
        }

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        prop_assert_eq!(fired.load(Ordering::SeqCst), 1);
        match outcome {
            Ok(v) => {
                prop_assert!(succeed);
                prop_assert_eq!(v, value);
            }
            Err(StepwiseError::Other(m)) => {
                prop_assert!(!succeed);
                prop_assert_eq!(m, value.to_string());
            }
            Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. The inline context never leaves a handle pending and never lets a panic
//    escape.
// ---------------------------------------------------------------------------
proptest! {
    #[test]
    fn inline_context_always_resolves(kind in 0u8..3, value in any::<u32>()) {
        let pending = InlineContext.run_async(move || match kind {
            0 => Ok(value),
            1 => Err(StepwiseError::Other("failed".into())),
            _ => panic!("panicked with {value}"),
        });

        prop_assert!(pending.is_resolved());
        match (kind, pending.try_take().unwrap()) {
            (0, Ok(v)) => prop_assert_eq!(v, value),
            (1, Err(StepwiseError::Other(_))) => {}
            (_, Err(StepwiseError::Execution(ExecutionError::Panicked(m)))) => {
                prop_assert_eq!(m, format!("panicked with {value}"));
            }
            (k, outcome) => prop_assert!(false, "kind {} gave {:?}", k, outcome),
        }
    }
}
