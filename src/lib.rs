//! Deferred actions over a single-assignment, multi-subscriber promise cell.
//!
//! A [`Promise`] is a write-once cell that any number of subscribers can
//! watch. A [`DeferAction`] wraps a promise around a not-yet-started
//! computation; starting it hands the body to a pluggable [`AsyncRunner`] and
//! moves the action through its phases ([`DeferAction`] ->
//! [`PendingAction`] -> [`CompletedAction`]). On top of that sit retry and
//! loop policies, and the [`race`]/[`combine`] fan-ins.
//!
//! # Examples
//!
//! ```
//! use defer_action::{BoxError, DeferAction, Retry};
//!
//! // build, start, block for the outcome
//! let pending = DeferAction::run(|| Ok::<_, BoxError>(21 * 2));
//! assert_eq!(pending.get_result().value(), Some(&42));
//!
//! // same recipe, but re-submitted on failure
//! let outcome = DeferAction::builder(|| Ok::<_, BoxError>("ok"))
//!     .retry(Retry::times(3))
//!     .build()
//!     .get_result();
//! assert_eq!(outcome.value(), Some(&"ok"));
//! ```
//!
//! Subscribers never miss a settlement: subscribing to an already-settled
//! promise replays the known outcome synchronously, and a promise whose last
//! real subscriber walks away aborts itself rather than keep computing for
//! nobody.

mod cancel;
mod combine;
mod defer;
mod outcome;
mod promise;
mod race;
mod retry;
mod runner;
mod scope;
mod subscription;
mod wait;

pub use cancel::{BoundThread, CancelToken};
pub use combine::{combine, combine2, PartialFailure};
pub use defer::{CompletedAction, DeferAction, DeferActionBuilder, PendingAction, Supplier};
pub use outcome::{BoxError, CancelReason, FailReason, Outcome};
pub use promise::{Promise, PromiseError, PromiseFuture};
pub use race::{race, RaceFailed, RaceResult};
pub use retry::{Loop, Retry, RetryTimes};
pub use runner::{default_runner, AsyncRunner, CallerRunner, Job, NewThreadRunner, ThreadPoolRunner};
pub use scope::{RunnerScope, ScopeGuard, ScopeKind};
pub use subscription::Subscription;
pub use wait::Wait;

/// Anything that carries a promise: the promise itself, every action phase,
/// and a race in flight. `chain` accepts any of them from its mapper.
pub trait HasPromise<T: Clone + Send + 'static> {
    fn promise(&self) -> &Promise<T>;

    /// Subscribes a settlement callback with an unbounded wait.
    fn on_done<F>(&self, callback: F) -> Subscription<T>
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
        Self: Sized,
    {
        self.promise().subscribe(Wait::forever(), callback)
    }
}
