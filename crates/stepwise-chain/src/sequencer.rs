use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::Span;

use stepwise_core::config::SequenceConfig;
use stepwise_core::context::WorkerContext;
use stepwise_core::error::{Result, StepFailure, StepwiseError};
use stepwise_core::pending::{PendingResult, Resolver};

use crate::args::CallArgs;

type StepFn = Box<dyn FnOnce(CallArgs) -> Result<()> + Send>;

/// One unit of work waiting in a [`Sequencer`].
pub struct QueuedCall {
    name: Cow<'static, str>,
    function: StepFn,
    args: CallArgs,
}

impl QueuedCall {
    /// Name given with [`Sequencer::push_named`], or the type name of the
    /// queued callable. For `fn` items this is the function path.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Value] {
        self.args.args()
    }

    pub fn kwargs(&self) -> &Map<String, Value> {
        self.args.kwargs()
    }

    pub fn call_args(&self) -> &CallArgs {
        &self.args
    }

    fn into_work(self) -> impl FnOnce() -> Result<()> + Send + 'static {
        let Self { function, args, .. } = self;
        move || function(args)
    }
}

impl fmt::Debug for QueuedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedCall")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Runs queued calls one after another on a [`WorkerContext`], stopping at
/// the first failure.
///
/// Calls are dispatched strictly in push order and never overlap: a call is
/// handed to the context only after the previous one has resolved. Return
/// values are discarded. Once a call fails, the calls behind it are dropped
/// without ever running and the failure resolves the whole run.
///
/// ```ignore
/// let mut seq = Sequencer::new(TokioContext::current()?);
/// seq.push_fn(prepare_datadir)
///     .push_named("start", start_node, CallArgs::new().kwarg("port", 40102))
///     .push_fn(announce);
/// seq.execute().await?;
/// ```
pub struct Sequencer<C> {
    context: C,
    queue: VecDeque<QueuedCall>,
    config: SequenceConfig,
}

impl<C> Sequencer<C>
where
    C: WorkerContext + Clone + 'static,
{
    pub fn new(context: C) -> Self {
        Self {
            context,
            queue: VecDeque::new(),
            config: SequenceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SequenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Queue `function` to be called with `args`.
    pub fn push<F, R>(&mut self, function: F, args: CallArgs) -> &mut Self
    where
        F: FnOnce(CallArgs) -> Result<R> + Send + 'static,
        R: 'static,
    {
        self.push_named(std::any::type_name::<F>(), function, args)
    }

    /// Queue `function` under an explicit name, used in logs and in the
    /// [`StepFailure`] of a failed run.
    pub fn push_named<F, R>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        function: F,
        args: CallArgs,
    ) -> &mut Self
    where
        F: FnOnce(CallArgs) -> Result<R> + Send + 'static,
        R: 'static,
    {
        self.queue.push_back(QueuedCall {
            name: name.into(),
            function: Box::new(move |args| function(args).map(drop)),
            args,
        });
        self
    }

    /// Queue `function` to be called without arguments.
    pub fn push_fn<F, R>(&mut self, function: F) -> &mut Self
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: 'static,
    {
        self.push_named(
            std::any::type_name::<F>(),
            move |_| function(),
            CallArgs::new(),
        )
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The queued calls in dispatch order.
    pub fn queued(&self) -> impl Iterator<Item = &QueuedCall> {
        self.queue.iter()
    }

    /// Start draining the queue and return a handle to the outcome of the run.
    ///
    /// The queue is moved into the run, so the sequencer is empty afterwards
    /// and executing it again resolves successfully without doing any work.
    pub fn execute(&mut self) -> PendingResult<()> {
        let queue = std::mem::take(&mut self.queue);
        let (resolver, pending) = PendingResult::channel();

        let metadata = serde_json::to_string(&self.config.metadata).unwrap_or_default();
        let span = tracing::debug_span!(
            "sequence",
            label = %self.config.label,
            run_id = %self.config.run_id,
            tags = ?self.config.tags,
            metadata = %metadata
        );
        span.in_scope(|| tracing::debug!(steps = queue.len(), "executing sequence"));

        Drain {
            context: self.context.clone(),
            queue,
            next_index: 0,
            resolver,
            span,
        }
        .run();

        pending
    }
}

impl<C> fmt::Debug for Sequencer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("queue", &self.queue)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// State of one `execute` run.
///
/// The loop in [`Drain::run`] is the draining state: it keeps dispatching as
/// long as calls resolve by the time their callback is registered, and parks
/// itself in a [`Handoff`] otherwise. Consuming the resolver, on success or on
/// abort, is the done state.
struct Drain<C> {
    context: C,
    queue: VecDeque<QueuedCall>,
    next_index: usize,
    resolver: Resolver<()>,
    span: Span,
}

/// Meeting point between the drain loop and the completion callback of the
/// call in flight. Whichever side arrives second continues the run, so the
/// loop never re-enters itself from a callback fired during registration.
enum Handoff<C> {
    Registering,
    Resolved(Result<()>),
    Parked(Drain<C>),
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<C> Drain<C>
where
    C: WorkerContext + Clone + 'static,
{
    fn run(mut self) {
        let _entered = self.span.clone().entered();

        loop {
            let Some(call) = self.queue.pop_front() else {
                tracing::debug!(steps = self.next_index, "sequence completed");
                self.resolver.succeed(());
                return;
            };

            let index = self.next_index;
            self.next_index += 1;
            let name = call.name.clone();
            tracing::trace!(index, name = %name, "dispatching call");

            let handoff = Arc::new(Mutex::new(Handoff::Registering));
            let callback_handoff = Arc::clone(&handoff);
            let callback_name = name.clone();
            self.context
                .run_async(call.into_work())
                .on_resolve(move |outcome| {
                    let mut slot = lock(&callback_handoff);
                    match std::mem::replace(&mut *slot, Handoff::Registering) {
                        Handoff::Parked(drain) => {
                            drop(slot);
                            drain.resume(index, callback_name, outcome);
                        }
                        _ => *slot = Handoff::Resolved(outcome),
                    }
                });

            let mut slot = lock(&handoff);
            match std::mem::replace(&mut *slot, Handoff::Registering) {
                Handoff::Resolved(Ok(())) => continue,
                Handoff::Resolved(Err(err)) => {
                    drop(slot);
                    return self.abort(index, name, err);
                }
                _ => {
                    *slot = Handoff::Parked(self);
                    return;
                }
            }
        }
    }

    fn resume(self, index: usize, name: Cow<'static, str>, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.run(),
            Err(err) => self.abort(index, name, err),
        }
    }

    fn abort(self, index: usize, name: Cow<'static, str>, err: StepwiseError) {
        let _entered = self.span.enter();
        let skipped = self.queue.len();
        tracing::warn!(index, name = %name, skipped, error = %err, "sequence aborted");
        self.resolver.fail(StepFailure {
            index,
            name: name.into_owned(),
            skipped,
            source: Box::new(err),
        });
    }
}
