//! The single-assignment, multi-subscriber promise cell.
//!
//! A [`Promise`] moves through `NOT_STARTED -> PENDING -> settled` exactly
//! once. Settlement fans the [`Outcome`] out to every registered subscriber
//! and eavesdropper, then clears the registry; anyone subscribing later gets
//! the known outcome replayed synchronously. The cell is shared behind an
//! `Arc`, so clones observe the same settlement.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::outcome::{panic_reason, CancelReason, FailReason, Outcome};
use crate::subscription::{ListenerKind, Subscription};
use crate::wait::Wait;
use crate::HasPromise;

/// Listener callbacks receive the settled outcome exactly once.
pub(crate) type Callback<T> = Box<dyn FnOnce(Outcome<T>) + Send>;

/// Deferred start hook; runs at most once, on the first `start()`.
pub(crate) type Starter = Box<dyn FnOnce() + Send>;

pub(crate) const NO_MORE_LISTENERS: &str = "no more listeners";

/// Error raised by the blocking wait itself (the settled outcome is returned
/// as data, never thrown).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromiseError {
    #[error("promise was not settled within {0:?}")]
    WaitTimeout(Duration),
}

struct Listener<T> {
    // single-assignment "has fired" flag; shared with the wait timer so a
    // natural settlement and an expiry racing each other resolve to exactly
    // one delivery
    fired: Arc<AtomicBool>,
    callback: Callback<T>,
}

enum State<T> {
    NotStarted,
    Pending,
    Done(Outcome<T>),
}

struct Cell<T> {
    state: State<T>,
    starter: Option<Starter>,
    subscribers: HashMap<u64, Listener<T>>,
    eavesdroppers: Vec<(u64, Listener<T>)>,
    wakers: Vec<Waker>,
}

struct Inner<T> {
    cell: Mutex<Cell<T>>,
    settled: Condvar,
    next_id: AtomicU64,
}

/// A single-assignment future cell with multi-subscriber fan-out.
///
/// # Examples
///
/// ```
/// use defer_action::Promise;
/// use std::thread;
///
/// let promise: Promise<i32> = Promise::not_started();
/// let waiter = promise.clone();
/// let handle = thread::spawn(move || waiter.get_result());
///
/// promise.make_complete(7);
/// let outcome = handle.join().unwrap();
/// assert_eq!(outcome.value(), Some(&7));
/// ```
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.inner.cell.lock().state {
            State::NotStarted => "NotStarted",
            State::Pending => "Pending",
            State::Done(o) if o.is_value() => "Done(Value)",
            State::Done(o) if o.is_cancelled() => "Done(Cancelled)",
            State::Done(_) => "Done(Failed)",
        };
        write!(f, "Promise<{state}>")
    }
}

fn deliver<T>(listener: Listener<T>, outcome: Outcome<T>) {
    if listener.fired.swap(true, Ordering::AcqRel) {
        return;
    }
    let callback = listener.callback;
    if catch_unwind(AssertUnwindSafe(move || callback(outcome))).is_err() {
        log::warn!("promise listener panicked during fan-out; other listeners unaffected");
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    fn with_cell(state: State<T>, starter: Option<Starter>) -> Self {
        Promise {
            inner: Arc::new(Inner {
                cell: Mutex::new(Cell {
                    state,
                    starter,
                    subscribers: HashMap::new(),
                    eavesdroppers: Vec::new(),
                    wakers: Vec::new(),
                }),
                settled: Condvar::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// A fresh promise with no backing computation; settle it through
    /// [`make_complete`](Promise::make_complete) and friends.
    pub fn not_started() -> Self {
        Promise::with_cell(State::NotStarted, None)
    }

    /// A promise whose first `start()` runs `starter` (submit a body to a
    /// runner, start a parent, ...).
    pub(crate) fn deferred(starter: Starter) -> Self {
        Promise::with_cell(State::NotStarted, Some(starter))
    }

    pub(crate) fn install_starter(&self, starter: Starter) {
        let mut cell = self.inner.cell.lock();
        if matches!(cell.state, State::NotStarted) {
            cell.starter = Some(starter);
        }
    }

    /// A promise settled with a value from the outset.
    pub fn of_value(value: T) -> Self {
        let promise = Promise::not_started();
        promise.settle(Outcome::Value(value));
        promise
    }

    /// A promise settled with a failure from the outset.
    pub fn of_error(err: impl Into<FailReason>) -> Self {
        let promise = Promise::not_started();
        promise.settle(Outcome::Failed(err.into()));
        promise
    }

    /// A promise cancelled from the outset.
    pub fn of_cancelled(message: impl Into<String>) -> Self {
        let promise = Promise::not_started();
        promise.settle(Outcome::Cancelled(CancelReason::with_message(message)));
        promise
    }

    /// Claims the `NOT_STARTED -> PENDING` transition and runs the starter if
    /// one is installed. Returns whether *this* call performed the
    /// transition; later calls are no-ops.
    pub fn start(&self) -> bool {
        let starter = {
            let mut cell = self.inner.cell.lock();
            if !matches!(cell.state, State::NotStarted) {
                return false;
            }
            cell.state = State::Pending;
            cell.starter.take()
        };
        // run outside the lock so the starter may re-enter the promise
        if let Some(run) = starter {
            run();
        }
        true
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.inner.cell.lock().state, State::NotStarted)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.inner.cell.lock().state, State::Pending)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.inner.cell.lock().state, State::Done(_))
    }

    /// The settled outcome, or `Outcome::NotReady` if the promise has not
    /// settled yet. Never blocks.
    pub fn peek(&self) -> Outcome<T> {
        match &self.inner.cell.lock().state {
            State::Done(o) => o.clone(),
            _ => Outcome::NotReady,
        }
    }

    /// Writes the terminal outcome. Exactly one settle call across all
    /// concurrent callers succeeds; the rest report `false` and change
    /// nothing. Listeners are invoked outside the cell lock, so callback
    /// code may safely re-enter the promise.
    pub(crate) fn settle(&self, outcome: Outcome<T>) -> bool {
        let (subscribers, eavesdroppers, wakers) = {
            let mut cell = self.inner.cell.lock();
            if matches!(cell.state, State::Done(_)) {
                return false;
            }
            cell.state = State::Done(outcome.clone());
            cell.starter = None;
            let subscribers: Vec<Listener<T>> =
                cell.subscribers.drain().map(|(_, l)| l).collect();
            let eavesdroppers: Vec<Listener<T>> =
                cell.eavesdroppers.drain(..).map(|(_, l)| l).collect();
            let wakers = std::mem::take(&mut cell.wakers);
            self.inner.settled.notify_all();
            (subscribers, eavesdroppers, wakers)
        };
        for listener in subscribers {
            deliver(listener, outcome.clone());
        }
        // eavesdroppers are delivered in registration order
        for listener in eavesdroppers {
            deliver(listener, outcome.clone());
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Settles with a value. Returns whether this call performed the
    /// settlement.
    pub fn make_complete(&self, value: T) -> bool {
        self.settle(Outcome::Value(value))
    }

    /// Settles with a failure.
    pub fn make_fail(&self, err: impl Into<FailReason>) -> bool {
        self.settle(Outcome::Failed(err.into()))
    }

    /// Cancels with no message. Idempotent: cancelling a settled promise is a
    /// no-op reporting `false`.
    pub fn abort(&self) -> bool {
        self.settle(Outcome::Cancelled(CancelReason::unspecified()))
    }

    /// Cancels with a message.
    pub fn abort_with(&self, message: impl Into<String>) -> bool {
        self.settle(Outcome::Cancelled(CancelReason::with_message(message)))
    }

    /// Cancels with a message and an originating cause.
    pub fn abort_because(&self, message: impl Into<String>, cause: FailReason) -> bool {
        self.settle(Outcome::Cancelled(CancelReason::with_cause(message, cause)))
    }

    /// Registers `callback` to receive the settled outcome exactly once. A
    /// promise that already settled replays the known outcome synchronously.
    pub fn subscribe<F>(&self, wait: Wait<T>, callback: F) -> Subscription<T>
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.listen(ListenerKind::Subscriber, wait, Box::new(callback))
    }

    /// Like [`subscribe`](Promise::subscribe), but the listener never counts
    /// toward "has any subscriber": removing the last eavesdropper does not
    /// auto-abort the promise.
    pub fn eavesdrop<F>(&self, wait: Wait<T>, callback: F) -> Subscription<T>
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.listen(ListenerKind::Eavesdropper, wait, Box::new(callback))
    }

    fn listen(&self, kind: ListenerKind, wait: Wait<T>, callback: Callback<T>) -> Subscription<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let fired = Arc::new(AtomicBool::new(false));
        let mut callback = Some(callback);
        let replay = {
            let mut cell = self.inner.cell.lock();
            if let State::Done(outcome) = &cell.state {
                Some(outcome.clone())
            } else if let Some(callback) = callback.take() {
                let listener = Listener {
                    fired: fired.clone(),
                    callback,
                };
                match kind {
                    ListenerKind::Subscriber => {
                        cell.subscribers.insert(id, listener);
                    }
                    ListenerKind::Eavesdropper => {
                        cell.eavesdroppers.push((id, listener));
                    }
                }
                None
            } else {
                None
            }
        };
        match (replay, callback) {
            (Some(outcome), Some(callback)) => {
                // already settled: the subscription is terminal from birth
                deliver(Listener { fired, callback }, outcome);
                Subscription::new(self.clone(), 0, kind)
            }
            _ => {
                if let Some(limit) = wait.limit() {
                    self.arm_wait_timer(id, kind, limit, wait.expiry_outcome());
                }
                Subscription::new(self.clone(), id, kind)
            }
        }
    }

    fn arm_wait_timer(&self, id: u64, kind: ListenerKind, limit: Duration, fallback: Outcome<T>) {
        let weak = Arc::downgrade(&self.inner);
        let spawned = thread::Builder::new()
            .name("defer-wait".into())
            .spawn(move || {
                thread::sleep(limit);
                if let Some(inner) = weak.upgrade() {
                    Promise { inner }.expire(id, kind, fallback);
                }
            });
        if let Err(err) = spawned {
            log::warn!("failed to arm wait timer, subscription waits forever: {err}");
        }
    }

    /// Wait expiry: detach the listener and hand it the policy fallback. The
    /// promise itself is not settled, but a subscriber removed here goes
    /// through the same orphaning policy as an explicit unsubscribe.
    fn expire(&self, id: u64, kind: ListenerKind, fallback: Outcome<T>) {
        let (listener, orphaned) = {
            let mut cell = self.inner.cell.lock();
            if matches!(cell.state, State::Done(_)) {
                return;
            }
            let listener = cell.take_listener(id, kind);
            let orphaned = listener.is_some()
                && kind == ListenerKind::Subscriber
                && cell.subscribers.is_empty();
            (listener, orphaned)
        };
        if let Some(listener) = listener {
            deliver(listener, fallback);
        }
        if orphaned {
            log::debug!("last subscriber's wait expired, aborting promise");
            self.abort_with(NO_MORE_LISTENERS);
        }
    }

    pub(crate) fn remove_listener(&self, id: u64, kind: ListenerKind) {
        let orphaned = {
            let mut cell = self.inner.cell.lock();
            if matches!(cell.state, State::Done(_)) {
                return;
            }
            let removed = cell.take_listener(id, kind);
            removed.is_some() && kind == ListenerKind::Subscriber && cell.subscribers.is_empty()
        };
        if orphaned {
            log::debug!("last subscriber left, aborting promise");
            self.abort_with(NO_MORE_LISTENERS);
        }
    }

    pub(crate) fn has_listener(&self, id: u64, kind: ListenerKind) -> bool {
        let cell = self.inner.cell.lock();
        match kind {
            ListenerKind::Subscriber => cell.subscribers.contains_key(&id),
            ListenerKind::Eavesdropper => cell.eavesdroppers.iter().any(|(i, _)| *i == id),
        }
    }

    /// Starts the promise if needed, then blocks the calling thread until it
    /// settles.
    pub fn get_result(&self) -> Outcome<T> {
        self.start();
        let mut cell = self.inner.cell.lock();
        loop {
            if let State::Done(outcome) = &cell.state {
                return outcome.clone();
            }
            self.inner.settled.wait(&mut cell);
        }
    }

    /// Bounded variant of [`get_result`](Promise::get_result).
    pub fn get_result_within(&self, timeout: Duration) -> Result<Outcome<T>, PromiseError> {
        self.start();
        let deadline = Instant::now() + timeout;
        let mut cell = self.inner.cell.lock();
        loop {
            if let State::Done(outcome) = &cell.state {
                return Ok(outcome.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(PromiseError::WaitTimeout(timeout));
            }
            let _ = self.inner.settled.wait_for(&mut cell, deadline - now);
        }
    }

    /// Derives a promise holding the transformed value. Failures and
    /// cancellations of the parent carry over untransformed; a panicking
    /// mapper fails the child.
    pub fn map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let parent = self.clone();
        let child: Promise<U> = Promise::deferred(Box::new(move || {
            parent.start();
        }));
        let target = child.clone();
        self.subscribe(Wait::forever(), move |outcome| {
            let settled = match outcome {
                Outcome::Value(v) => match catch_unwind(AssertUnwindSafe(move || f(v))) {
                    Ok(u) => Outcome::Value(u),
                    Err(payload) => Outcome::Failed(panic_reason(payload)),
                },
                other => other.carry_over(),
            };
            target.settle(settled);
        });
        child
    }

    /// Derives a promise that keeps the value only if `predicate` holds;
    /// a settled value failing the predicate yields `Value(None)`.
    pub fn filter<F>(&self, predicate: F) -> Promise<Option<T>>
    where
        F: FnOnce(&T) -> bool + Send + 'static,
    {
        self.map(move |v| if predicate(&v) { Some(v) } else { None })
    }

    /// Future-flattening: `f` maps the settled value to another
    /// promise-bearing thing, and the derived promise settles with *that*
    /// promise's outcome.
    pub fn chain<U, H, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        H: HasPromise<U>,
        F: FnOnce(T) -> H + Send + 'static,
    {
        let parent = self.clone();
        let child: Promise<U> = Promise::deferred(Box::new(move || {
            parent.start();
        }));
        let target = child.clone();
        self.subscribe(Wait::forever(), move |outcome| match outcome {
            Outcome::Value(v) => {
                let holder = match catch_unwind(AssertUnwindSafe(move || f(v))) {
                    Ok(h) => h,
                    Err(payload) => {
                        target.settle(Outcome::Failed(panic_reason(payload)));
                        return;
                    }
                };
                let inner = holder.promise().clone();
                inner.subscribe(Wait::forever(), move |o| {
                    target.settle(o);
                });
                inner.start();
            }
            other => {
                target.settle(other.carry_over());
            }
        });
        child
    }

    /// Adapter for awaiting the promise from async code.
    pub fn to_future(&self) -> PromiseFuture<T> {
        PromiseFuture {
            promise: self.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> HasPromise<T> for Promise<T> {
    fn promise(&self) -> &Promise<T> {
        self
    }
}

/// `Future` adapter over a [`Promise`]; resolves to the settled [`Outcome`].
/// Each poll of an unsettled promise parks the task's waker in the cell, and
/// settlement wakes them all.
pub struct PromiseFuture<T> {
    promise: Promise<T>,
}

impl<T: Clone + Send + 'static> Future for PromiseFuture<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.promise.start();
        let mut cell = self.promise.inner.cell.lock();
        if let State::Done(outcome) = &cell.state {
            Poll::Ready(outcome.clone())
        } else {
            cell.wakers.push(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl<T> Cell<T> {
    fn take_listener(&mut self, id: u64, kind: ListenerKind) -> Option<Listener<T>> {
        match kind {
            ListenerKind::Subscriber => self.subscribers.remove(&id),
            ListenerKind::Eavesdropper => self
                .eavesdroppers
                .iter()
                .position(|(i, _)| *i == id)
                .map(|at| self.eavesdroppers.remove(at).1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn exactly_one_settlement_wins() {
        let promise: Promise<i32> = Promise::not_started();
        promise.start();
        assert!(promise.make_complete(1));
        assert!(!promise.make_complete(2));
        assert!(!promise.make_fail(FailReason::msg("late")));
        assert!(!promise.abort());
        assert_eq!(promise.get_result().value(), Some(&1));
    }

    #[test]
    fn concurrent_settlers_exactly_one_succeeds() {
        let promise: Promise<usize> = Promise::not_started();
        promise.start();
        let wins = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for n in 0..8 {
            let promise = promise.clone();
            let wins = wins.clone();
            handles.push(thread::spawn(move || {
                let won = if n % 2 == 0 {
                    promise.make_complete(n)
                } else {
                    promise.abort_with("racer")
                };
                if won {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert!(promise.is_done());
    }

    #[test]
    fn late_subscribe_replays_synchronously() {
        let promise = Promise::of_value(5);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        promise.subscribe(Wait::forever(), move |outcome| {
            assert_eq!(outcome.value(), Some(&5));
            seen.fetch_add(1, Ordering::SeqCst);
        });
        // synchronous: delivered before subscribe returned
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_is_idempotent_and_runs_starter_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = runs.clone();
        let promise: Promise<i32> = Promise::deferred(Box::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(promise.start());
        assert!(!promise.start());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribing_last_subscriber_aborts() {
        let promise: Promise<i32> = Promise::not_started();
        let first = promise.subscribe(Wait::forever(), |_| {});
        let second = promise.subscribe(Wait::forever(), |_| {});
        first.unsubscribe();
        assert!(!promise.is_done());
        second.unsubscribe();
        let outcome = promise.peek();
        assert!(outcome.is_cancelled());
        assert_eq!(
            outcome.cancel_reason().unwrap().message(),
            Some(NO_MORE_LISTENERS)
        );
    }

    #[test]
    fn removing_the_only_eavesdropper_does_not_abort() {
        let promise: Promise<i32> = Promise::not_started();
        let ear = promise.eavesdrop(Wait::forever(), |_| {});
        ear.unsubscribe();
        assert!(!promise.is_done());
    }

    #[test]
    fn wait_expiry_delivers_fallback_exactly_once() {
        let promise: Promise<i32> = Promise::not_started();
        promise.start();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        promise.subscribe(
            Wait::at_most(Duration::from_millis(20)),
            move |outcome| {
                assert!(outcome.is_cancelled());
                seen.fetch_add(1, Ordering::SeqCst);
            },
        );
        thread::sleep(Duration::from_millis(120));
        // expiry removed the only subscriber, so the orphan policy kicked in
        assert!(promise.peek().is_cancelled());
        // the natural settlement lost the race and must be dropped silently
        assert!(!promise.make_complete(9));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_expiry_fallback_value() {
        let promise: Promise<i32> = Promise::not_started();
        promise.start();
        let got = Arc::new(Mutex::new(None));
        let sink = got.clone();
        promise.subscribe(
            Wait::at_most(Duration::from_millis(10)).or_value(-1),
            move |outcome| {
                *sink.lock() = outcome.into_value();
            },
        );
        thread::sleep(Duration::from_millis(100));
        assert_eq!(*got.lock(), Some(-1));
    }

    #[test]
    fn map_transforms_and_carries_failures_over() {
        let doubled = Promise::of_value(21).map(|v| v * 2);
        assert_eq!(doubled.get_result().value(), Some(&42));

        let failed: Promise<i32> = Promise::of_error(FailReason::msg("boom"));
        let mapped = failed.map(|v| v + 1);
        assert!(mapped.get_result().is_failed());
    }

    #[test]
    fn filter_keeps_or_drops() {
        let kept = Promise::of_value(4).filter(|v| v % 2 == 0);
        assert_eq!(kept.get_result().value(), Some(&Some(4)));

        let dropped = Promise::of_value(5).filter(|v| v % 2 == 0);
        assert_eq!(dropped.get_result().value(), Some(&None));
    }

    #[test]
    fn chain_flattens_the_inner_promise() {
        let chained = Promise::of_value(6).chain(|v| Promise::of_value(v * 7));
        assert_eq!(chained.get_result().value(), Some(&42));

        let inner_fails = Promise::of_value(1)
            .chain(|_| Promise::<i32>::of_error(FailReason::msg("inner")));
        assert!(inner_fails.get_result().is_failed());
    }

    #[test]
    fn derived_promise_start_delegates_to_parent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = runs.clone();
        let parent: Promise<i32> = Promise::deferred(Box::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        let child = parent.map(|v| v + 1);
        child.start();
        assert!(parent.is_started());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_result_within_times_out() {
        let promise: Promise<i32> = Promise::not_started();
        let err = promise
            .get_result_within(Duration::from_millis(30))
            .unwrap_err();
        assert_eq!(err, PromiseError::WaitTimeout(Duration::from_millis(30)));
    }

    #[test]
    fn panicking_listener_does_not_block_siblings() {
        let promise: Promise<i32> = Promise::not_started();
        promise.start();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        promise.subscribe(Wait::forever(), |_| panic!("bad listener"));
        promise.subscribe(Wait::forever(), move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        promise.make_complete(1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn future_adapter_resolves_on_settlement() {
        let promise: Promise<i32> = Promise::not_started();
        promise.start();
        let remote = promise.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.make_complete(3);
        });
        let outcome = block_on(promise.to_future());
        assert_eq!(outcome.value(), Some(&3));
    }
}
