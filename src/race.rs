//! Fan-in: first value wins, the rest are told to stop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::defer::DeferAction;
use crate::outcome::{FailReason, Outcome};
use crate::promise::{Promise, PromiseError};
use crate::wait::Wait;
use crate::HasPromise;

/// The race ended with every branch settling and none of them producing a
/// value. The per-branch outcomes stay inspectable on the [`RaceResult`].
#[derive(Debug, Error)]
#[error("race finished without a winning result across {branches} branch(es)")]
pub struct RaceFailed {
    pub branches: usize,
}

/// Handle to a running (or finished) race: the combined promise plus the
/// individual branches.
pub struct RaceResult<T: Clone + Send + 'static> {
    promise: Promise<T>,
    branches: Vec<Promise<T>>,
    outcomes: Arc<Mutex<Vec<Outcome<T>>>>,
}

impl<T: Clone + Send + 'static> RaceResult<T> {
    /// Per-branch outcome snapshot, in branch order. Branches that have not
    /// settled yet show as `NotReady`.
    pub fn outcomes(&self) -> Vec<Outcome<T>> {
        self.outcomes.lock().clone()
    }

    /// The individual branch promises, in the order the actions were given.
    pub fn branches(&self) -> &[Promise<T>] {
        &self.branches
    }

    /// Blocks for the race's outcome.
    pub fn get_result(&self) -> Outcome<T> {
        self.promise.get_result()
    }

    /// Blocks for the race's outcome, bounded.
    pub fn get_result_within(&self, timeout: Duration) -> Result<Outcome<T>, PromiseError> {
        self.promise.get_result_within(timeout)
    }
}

impl<T: Clone + Send + 'static> HasPromise<T> for RaceResult<T> {
    fn promise(&self) -> &Promise<T> {
        &self.promise
    }
}

/// Starts every action; the first branch to settle with a value wins and
/// every other branch is aborted. If all branches settle without a value the
/// race aborts, carrying [`RaceFailed`] as the cause.
///
/// # Examples
///
/// ```
/// use defer_action::{race, BoxError, DeferAction};
/// use std::thread;
/// use std::time::Duration;
///
/// let slow = DeferAction::builder(|| {
///     thread::sleep(Duration::from_millis(200));
///     Ok::<_, BoxError>("slow")
/// })
/// .build();
/// let quick = DeferAction::builder(|| Ok::<_, BoxError>("quick")).build();
///
/// let result = race(vec![slow, quick]);
/// assert_eq!(result.get_result().value(), Some(&"quick"));
/// ```
pub fn race<T: Clone + Send + 'static>(actions: Vec<DeferAction<T>>) -> RaceResult<T> {
    let count = actions.len();
    let result: Promise<T> = Promise::not_started();
    result.start();

    if count == 0 {
        result.abort_because(
            "race finished without a winning result",
            FailReason::new(RaceFailed { branches: 0 }),
        );
        return RaceResult {
            promise: result,
            branches: Vec::new(),
            outcomes: Arc::new(Mutex::new(Vec::new())),
        };
    }

    let outcomes = Arc::new(Mutex::new(vec![Outcome::NotReady; count]));
    let decided = Arc::new(AtomicBool::new(false));
    let undecided_left = Arc::new(AtomicUsize::new(count));
    let branches: Vec<Promise<T>> = actions.iter().map(|a| a.promise().clone()).collect();

    for (index, action) in actions.iter().enumerate() {
        let result = result.clone();
        let outcomes = outcomes.clone();
        let decided = decided.clone();
        let undecided_left = undecided_left.clone();
        let siblings = branches.clone();
        action.promise().subscribe(Wait::forever(), move |outcome| {
            outcomes.lock()[index] = outcome.clone();
            if outcome.is_value() && !decided.swap(true, Ordering::AcqRel) {
                result.settle(outcome);
                log::debug!("race branch {index} won, aborting {} sibling(s)", siblings.len() - 1);
                for (other, sibling) in siblings.iter().enumerate() {
                    if other != index {
                        sibling.abort_with("lost the race");
                    }
                }
            } else if undecided_left.fetch_sub(1, Ordering::AcqRel) == 1
                && !decided.load(Ordering::Acquire)
            {
                // every branch settled, none with a value
                result.abort_because(
                    "race finished without a winning result",
                    FailReason::new(RaceFailed { branches: count }),
                );
            }
        });
    }

    for action in actions {
        action.start();
    }

    RaceResult {
        promise: result,
        branches,
        outcomes,
    }
}
