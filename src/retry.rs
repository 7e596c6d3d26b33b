//! Resubmission policies.
//!
//! [`Retry`] re-executes a builder's original supplier while attempts come
//! back without a value, up to a bound (or forever), sleeping between
//! attempts. [`Loop`] is the retry-forever-but-keep-the-final-answer variant
//! used for polling-until-condition; it never aborts with "retry exceeded".
//!
//! Both ride the same driver: each settled attempt is judged, and the verdict
//! either settles the outer action, aborts it, or schedules another attempt
//! built fresh from the same recipe.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::defer::{DeferAction, DeferActionBuilder};
use crate::outcome::Outcome;
use crate::promise::Promise;
use crate::wait::Wait;
use crate::HasPromise;

/// How many attempts a [`Retry`] allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTimes {
    /// One attempt, no resubmission.
    NoRetry,
    /// Up to this many attempts in total; exhausting them aborts the action.
    Bounded(u32),
    /// Resubmit until a value shows up.
    Forever,
}

/// Retry policy: attempt budget plus inter-attempt delay.
///
/// An attempt "failed" whenever its outcome carries no value; the policy
/// deliberately does not distinguish a thrown failure from a cancellation.
#[derive(Debug, Clone)]
pub struct Retry {
    times: RetryTimes,
    wait: Duration,
}

impl Retry {
    pub fn no_retry() -> Self {
        Retry {
            times: RetryTimes::NoRetry,
            wait: Duration::ZERO,
        }
    }

    /// Allows `n` attempts in total. `times(0)` means no retry.
    pub fn times(n: u32) -> Self {
        Retry {
            times: if n == 0 {
                RetryTimes::NoRetry
            } else {
                RetryTimes::Bounded(n)
            },
            wait: Duration::ZERO,
        }
    }

    pub fn forever() -> Self {
        Retry {
            times: RetryTimes::Forever,
            wait: Duration::ZERO,
        }
    }

    /// Sets the delay between attempts.
    pub fn wait_for(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn attempt_budget(&self) -> RetryTimes {
        self.times
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }
}

impl Default for Retry {
    fn default() -> Self {
        Retry::no_retry()
    }
}

/// When a [`Loop`] stops resubmitting. Either way the loop's action settles
/// with the last attempt's outcome.
enum LoopUntil<T> {
    Count(u32),
    Condition(Arc<dyn Fn(&Outcome<T>) -> bool + Send + Sync>),
}

impl<T> Clone for LoopUntil<T> {
    fn clone(&self) -> Self {
        match self {
            LoopUntil::Count(n) => LoopUntil::Count(*n),
            LoopUntil::Condition(f) => LoopUntil::Condition(f.clone()),
        }
    }
}

/// Unconditional resubmission that keeps the final answer.
pub struct Loop<T> {
    until: LoopUntil<T>,
    wait: Duration,
}

impl<T> Clone for Loop<T> {
    fn clone(&self) -> Self {
        Loop {
            until: self.until.clone(),
            wait: self.wait,
        }
    }
}

impl<T: Clone + Send + 'static> Loop<T> {
    /// Runs the supplier `n` times (at least once) and settles with the last
    /// outcome.
    pub fn count(n: u32) -> Self {
        Loop {
            until: LoopUntil::Count(n.max(1)),
            wait: Duration::ZERO,
        }
    }

    /// Resubmits until `condition` holds for an attempt's outcome, then
    /// settles with that outcome.
    pub fn until<F>(condition: F) -> Self
    where
        F: Fn(&Outcome<T>) -> bool + Send + Sync + 'static,
    {
        Loop {
            until: LoopUntil::Condition(Arc::new(condition)),
            wait: Duration::ZERO,
        }
    }

    /// Sets the delay between attempts.
    pub fn wait_for(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub(crate) fn create(&self, builder: &DeferActionBuilder<T>) -> DeferAction<T> {
        match &self.until {
            LoopUntil::Count(n) => {
                let remaining = AtomicI64::new(i64::from(*n));
                drive(
                    builder,
                    self.wait,
                    Box::new(move |_outcome| {
                        if remaining.fetch_sub(1, Ordering::SeqCst) <= 1 {
                            Verdict::Settle
                        } else {
                            Verdict::Again
                        }
                    }),
                )
            }
            LoopUntil::Condition(condition) => {
                let condition = condition.clone();
                drive(
                    builder,
                    self.wait,
                    Box::new(move |outcome| {
                        if (*condition)(outcome) {
                            Verdict::Settle
                        } else {
                            Verdict::Again
                        }
                    }),
                )
            }
        }
    }
}

/// Wires a builder's configured retry policy around its one-shot action.
pub(crate) fn build_with_retry<T: Clone + Send + 'static>(
    builder: &DeferActionBuilder<T>,
) -> DeferAction<T> {
    let policy = builder.retry_policy().clone();
    match policy.times {
        RetryTimes::NoRetry => builder.materialize(),
        RetryTimes::Forever => drive(
            builder,
            policy.wait,
            Box::new(|outcome| {
                if outcome.is_value() {
                    Verdict::Settle
                } else {
                    Verdict::Again
                }
            }),
        ),
        RetryTimes::Bounded(n) => {
            let remaining = AtomicI64::new(i64::from(n));
            drive(
                builder,
                policy.wait,
                Box::new(move |outcome| {
                    if outcome.is_value() {
                        Verdict::Settle
                    } else if remaining.fetch_sub(1, Ordering::SeqCst) <= 1 {
                        Verdict::Abort(format!("retry exceeded after {n} attempts"))
                    } else {
                        Verdict::Again
                    }
                }),
            )
        }
    }
}

enum Verdict {
    /// The attempt's outcome becomes the outer action's outcome.
    Settle,
    /// Give up with a cancellation.
    Abort(String),
    /// Build a fresh attempt from the recipe and resubmit it.
    Again,
}

type Decide<T> = Box<dyn Fn(&Outcome<T>) -> Verdict + Send + Sync>;

struct DriveState<T: Clone + Send + 'static> {
    builder: DeferActionBuilder<T>,
    outer: Promise<T>,
    decide: Decide<T>,
    wait: Duration,
}

fn drive<T: Clone + Send + 'static>(
    builder: &DeferActionBuilder<T>,
    wait: Duration,
    decide: Decide<T>,
) -> DeferAction<T> {
    let outer: Promise<T> = Promise::not_started();
    let state = Arc::new(DriveState {
        builder: builder.clone(),
        outer: outer.clone(),
        decide,
        wait,
    });
    outer.install_starter(Box::new(move || launch(state)));
    DeferAction::from_promise(outer)
}

fn launch<T: Clone + Send + 'static>(state: Arc<DriveState<T>>) {
    let attempt = state.builder.materialize();
    let settled = state.clone();
    attempt
        .promise()
        .subscribe(Wait::forever(), move |outcome| {
            on_attempt_settled(settled, outcome);
        });
    attempt.start();
}

fn on_attempt_settled<T: Clone + Send + 'static>(state: Arc<DriveState<T>>, outcome: Outcome<T>) {
    match (state.decide)(&outcome) {
        Verdict::Settle => {
            state.outer.settle(outcome);
        }
        Verdict::Abort(message) => {
            log::debug!("giving up on action: {message}");
            state.outer.abort_with(message);
        }
        Verdict::Again => {
            let next = state.clone();
            let runner = state.builder.runner_arc();
            runner.run(Box::new(move || {
                if next.wait > Duration::ZERO {
                    thread::sleep(next.wait);
                }
                // the outer action may have been aborted while we slept
                if !next.outer.is_done() {
                    launch(next);
                }
            }));
        }
    }
}
