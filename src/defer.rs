//! The action lifecycle around a promise: not yet started, running, settled.
//!
//! Each phase is its own type, so completing an action that has not started
//! is unrepresentable rather than a runtime error. Phase transitions consume:
//! `DeferAction::start` hands back a [`PendingAction`], and the completion
//! calls on [`PendingAction`] hand back a [`CompletedAction`] that only
//! allows inspection.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::outcome::{panic_reason, BoxError, FailReason, Outcome};
use crate::promise::{Promise, PromiseError};
use crate::retry::{Loop, Retry};
use crate::runner::{default_runner, AsyncRunner};
use crate::scope::RunnerScope;
use crate::wait::Wait;
use crate::HasPromise;

/// A deferred computation body. It receives the action's [`CancelToken`] and
/// is expected to check it at safe points when it runs for long.
pub type Supplier<T> = Arc<dyn Fn(&CancelToken) -> Result<T, BoxError> + Send + Sync>;

/// Accumulates an action's recipe; `build()` may be called any number of
/// times and each call materializes an independent action from the same
/// recipe (which is what lets a retry re-execute the original supplier).
pub struct DeferActionBuilder<T> {
    supplier: Supplier<T>,
    interrupt_on_cancel: bool,
    on_start: Option<Arc<dyn Fn() + Send + Sync>>,
    runner: Arc<dyn AsyncRunner>,
    retry: Retry,
    scope: Option<Arc<RunnerScope>>,
}

impl<T> Clone for DeferActionBuilder<T> {
    fn clone(&self) -> Self {
        DeferActionBuilder {
            supplier: self.supplier.clone(),
            interrupt_on_cancel: self.interrupt_on_cancel,
            on_start: self.on_start.clone(),
            runner: self.runner.clone(),
            retry: self.retry.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> DeferActionBuilder<T> {
    /// Starts a recipe from a plain supplier.
    pub fn new<F>(supplier: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        DeferActionBuilder::from_cancelable(move |_| supplier())
    }

    /// Starts a recipe from a supplier that watches the cancel token.
    pub fn from_cancelable<F>(supplier: F) -> Self
    where
        F: Fn(&CancelToken) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        DeferActionBuilder {
            supplier: Arc::new(supplier),
            interrupt_on_cancel: false,
            on_start: None,
            runner: default_runner(),
            retry: Retry::no_retry(),
            scope: None,
        }
    }

    /// When set, cancelling the promise while the body runs trips the body's
    /// token and unparks its thread.
    pub fn interrupt_on_cancel(mut self, yes: bool) -> Self {
        self.interrupt_on_cancel = yes;
        self
    }

    /// Hook invoked on the runner thread just before the supplier.
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(hook));
        self
    }

    pub fn runner(mut self, runner: Arc<dyn AsyncRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    pub fn scope(mut self, scope: Arc<RunnerScope>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Materializes an action, wiring in the configured retry policy.
    pub fn build(&self) -> DeferAction<T> {
        crate::retry::build_with_retry(self)
    }

    /// Materializes an action that resubmits under `lp` instead of the
    /// configured retry policy.
    pub fn build_loop(&self, lp: &Loop<T>) -> DeferAction<T> {
        lp.create(self)
    }

    pub(crate) fn retry_policy(&self) -> &Retry {
        &self.retry
    }

    pub(crate) fn runner_arc(&self) -> Arc<dyn AsyncRunner> {
        self.runner.clone()
    }

    /// One-shot materialization: no retry wrapping.
    pub(crate) fn materialize(&self) -> DeferAction<T> {
        let promise: Promise<T> = Promise::not_started();
        let token = CancelToken::new();

        if self.interrupt_on_cancel {
            let watch = token.clone();
            promise.eavesdrop(Wait::forever(), move |outcome: Outcome<T>| {
                if outcome.is_cancelled() {
                    watch.cancel();
                }
            });
        }

        let body = {
            let supplier = self.supplier.clone();
            let on_start = self.on_start.clone();
            let scope = self.scope.clone();
            let interrupt_on_cancel = self.interrupt_on_cancel;
            let promise = promise.clone();
            let token = token.clone();
            move || {
                // cancelled before the runner got to us: nothing to do
                if promise.is_done() || token.is_cancelled() {
                    return;
                }
                let _tracked = scope.as_ref().map(|s| s.enter(&token));
                // bound only while the body runs; the guard clears it so a
                // late cancel cannot nudge whatever this thread does next
                let _bound = interrupt_on_cancel.then(|| token.bind_current_thread());
                if let Some(hook) = on_start.as_deref() {
                    hook();
                }
                match catch_unwind(AssertUnwindSafe(|| (*supplier)(&token))) {
                    Ok(Ok(value)) => {
                        promise.make_complete(value);
                    }
                    Ok(Err(err)) => {
                        promise.make_fail(err);
                    }
                    Err(payload) => {
                        promise.make_fail(panic_reason(payload));
                    }
                }
            }
        };
        let runner = self.runner.clone();
        promise.install_starter(Box::new(move || runner.run(Box::new(body))));

        DeferAction {
            promise,
            token,
            live: true,
        }
    }
}

/// An action that has not started yet.
///
/// # Examples
///
/// ```
/// use defer_action::{BoxError, DeferAction};
///
/// let pending = DeferAction::run(|| Ok::<_, BoxError>(21 * 2));
/// assert_eq!(pending.get_result().value(), Some(&42));
/// ```
pub struct DeferAction<T: Clone + Send + 'static> {
    promise: Promise<T>,
    token: CancelToken,
    live: bool,
}

impl<T: Clone + Send + 'static> DeferAction<T> {
    /// Begins a builder around `supplier`.
    pub fn builder<F>(supplier: F) -> DeferActionBuilder<T>
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        DeferActionBuilder::new(supplier)
    }

    /// An action with no body; it settles only through the completion calls
    /// on its [`PendingAction`] (or directly on the promise).
    pub fn manual() -> Self {
        DeferAction {
            promise: Promise::not_started(),
            token: CancelToken::new(),
            live: true,
        }
    }

    /// Build-and-start in one step, with the default runner and no retry.
    pub fn run<F>(supplier: F) -> PendingAction<T>
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        DeferActionBuilder::new(supplier).build().start()
    }

    /// Fan-in: starts every action and settles with the first value produced;
    /// see [`crate::race`].
    pub fn race(actions: Vec<DeferAction<T>>) -> crate::race::RaceResult<T> {
        crate::race::race(actions)
    }

    pub(crate) fn from_promise(promise: Promise<T>) -> Self {
        DeferAction {
            promise,
            token: CancelToken::new(),
            live: true,
        }
    }

    /// The cancel token the body will observe.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Starts the action: claims the promise's pending transition and hands
    /// the body to the runner.
    pub fn start(mut self) -> PendingAction<T> {
        self.live = false;
        let promise = self.promise.clone();
        promise.start();
        PendingAction { promise }
    }

    /// Starts and then blocks for the outcome.
    pub fn get_result(self) -> Outcome<T> {
        self.start().get_result()
    }
}

impl<T: Clone + Send + 'static> HasPromise<T> for DeferAction<T> {
    fn promise(&self) -> &Promise<T> {
        &self.promise
    }
}

impl<T: Clone + Send + 'static> Drop for DeferAction<T> {
    /// An action dropped without ever starting releases its waiters instead
    /// of leaving them hanging.
    fn drop(&mut self) {
        if self.live && !self.promise.is_started() {
            self.promise.abort_with("action dropped before start");
        }
    }
}

/// An action that has started and may still be running.
pub struct PendingAction<T> {
    promise: Promise<T>,
}

impl<T> Clone for PendingAction<T> {
    fn clone(&self) -> Self {
        PendingAction {
            promise: self.promise.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> PendingAction<T> {
    /// Settles with a value. If a concurrent settlement won, the action is
    /// completed all the same - with the winner's outcome.
    pub fn complete(self, value: T) -> CompletedAction<T> {
        self.promise.make_complete(value);
        CompletedAction {
            promise: self.promise,
        }
    }

    /// Settles with a failure.
    pub fn fail(self, err: impl Into<FailReason>) -> CompletedAction<T> {
        self.promise.make_fail(err);
        CompletedAction {
            promise: self.promise,
        }
    }

    /// Cancels the action.
    pub fn abort(self) -> CompletedAction<T> {
        self.promise.abort();
        CompletedAction {
            promise: self.promise,
        }
    }

    /// Cancels the action with a message.
    pub fn abort_with(self, message: impl Into<String>) -> CompletedAction<T> {
        self.promise.abort_with(message);
        CompletedAction {
            promise: self.promise,
        }
    }

    /// Blocks until the action settles.
    pub fn get_result(&self) -> Outcome<T> {
        self.promise.get_result()
    }

    /// Blocks until the action settles or `timeout` elapses.
    pub fn get_result_within(&self, timeout: Duration) -> Result<Outcome<T>, PromiseError> {
        self.promise.get_result_within(timeout)
    }
}

impl<T: Clone + Send + 'static> HasPromise<T> for PendingAction<T> {
    fn promise(&self) -> &Promise<T> {
        &self.promise
    }
}

/// A settled action; inspection only.
pub struct CompletedAction<T> {
    promise: Promise<T>,
}

impl<T: Clone + Send + 'static> CompletedAction<T> {
    /// The settled outcome.
    pub fn outcome(&self) -> Outcome<T> {
        self.promise.peek()
    }
}

impl<T: Clone + Send + 'static> HasPromise<T> for CompletedAction<T> {
    fn promise(&self) -> &Promise<T> {
        &self.promise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CallerRunner;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    fn ok<T>(value: T) -> Result<T, BoxError> {
        Ok(value)
    }

    #[test]
    fn run_produces_the_supplier_value() {
        let pending = DeferAction::run(|| ok(40 + 2));
        assert_eq!(pending.get_result().value(), Some(&42));
    }

    #[test]
    fn supplier_error_becomes_a_failed_outcome() {
        let pending = DeferAction::run(|| -> Result<i32, BoxError> { Err("nope".into()) });
        let outcome = pending.get_result();
        assert!(outcome.is_failed());
        assert_eq!(outcome.fail_reason().unwrap().to_string(), "nope");
    }

    #[test]
    fn supplier_panic_becomes_a_failed_outcome() {
        let pending = DeferAction::run(|| -> Result<i32, BoxError> { panic!("blew up") });
        let outcome = pending.get_result();
        assert!(outcome.is_failed());
        assert_eq!(outcome.fail_reason().unwrap().to_string(), "blew up");
    }

    #[test]
    fn manual_action_walks_the_three_phases() {
        let action: DeferAction<i32> = DeferAction::manual();
        let promise = action.promise().clone();
        assert!(!promise.is_started());

        let pending = action.start();
        assert!(promise.is_pending());

        let completed = pending.complete(5);
        assert_eq!(completed.outcome().value(), Some(&5));
    }

    #[test]
    fn completing_after_a_concurrent_winner_keeps_the_winner() {
        let action: DeferAction<i32> = DeferAction::manual();
        let pending = action.start();
        pending.promise().make_complete(1);
        let completed = pending.complete(2);
        assert_eq!(completed.outcome().value(), Some(&1));
    }

    #[test]
    fn dropped_unstarted_action_aborts_its_promise() {
        let action: DeferAction<i32> = DeferAction::manual();
        let promise = action.promise().clone();
        drop(action);
        let outcome = promise.peek();
        assert!(outcome.is_cancelled());
        assert_eq!(
            outcome.cancel_reason().unwrap().message(),
            Some("action dropped before start")
        );
    }

    #[test]
    fn on_start_runs_before_the_supplier() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let hook_order = order.clone();
        let body_order = order.clone();
        let pending = DeferActionBuilder::new(move || {
            body_order.lock().push("supplier");
            ok(())
        })
        .on_start(move || hook_order.lock().push("on_start"))
        .runner(Arc::new(CallerRunner))
        .build()
        .start();
        pending.get_result();
        assert_eq!(*order.lock(), vec!["on_start", "supplier"]);
    }

    #[test]
    fn builder_is_reusable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let builder = DeferActionBuilder::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            ok(1)
        })
        .runner(Arc::new(CallerRunner));

        let first = builder.build().start();
        let second = builder.build().start();
        assert_eq!(first.get_result().value(), Some(&1));
        assert_eq!(second.get_result().value(), Some(&1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn interrupt_on_cancel_trips_the_running_body() {
        let entered = Arc::new(AtomicBool::new(false));
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let entered_flag = entered.clone();
        let cancel_flag = saw_cancel.clone();
        let pending = DeferActionBuilder::from_cancelable(move |token: &CancelToken| {
            entered_flag.store(true, Ordering::SeqCst);
            let cancelled = token.wait(std::time::Duration::from_secs(10));
            cancel_flag.store(cancelled, Ordering::SeqCst);
            if cancelled {
                Err("cancelled".into())
            } else {
                ok(0)
            }
        })
        .interrupt_on_cancel(true)
        .build()
        .start();

        // wait for the body to be inside its token wait
        for _ in 0..200 {
            if entered.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(entered.load(Ordering::SeqCst), "body never started");

        pending.promise().abort_with("user cancelled");
        for _ in 0..200 {
            if saw_cancel.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(saw_cancel.load(Ordering::SeqCst), "body never saw the cancel");
        assert!(pending.get_result().is_cancelled());
    }
}
