//! Fan-in: wait for every branch, merge in slot order, bail on first trouble.
//!
//! Slot assignment is fixed at construction: branch `i` always fills slot
//! `i`, and the merge function sees values in that order no matter which
//! branch settles first. The first error-class outcome (failure,
//! cancellation, not-ready) short-circuits the whole combine and detaches the
//! remaining branches, which orphans them into their own auto-abort.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::outcome::{panic_reason, CancelReason, FailReason, Outcome};
use crate::promise::Promise;
use crate::subscription::Subscription;
use crate::wait::Wait;

/// A combine branch failed; records which one, out of how many, and keeps
/// the branch's own failure as the cause.
#[derive(Debug, Error)]
#[error("branch {index} out of {count} failed")]
pub struct PartialFailure {
    pub index: usize,
    pub count: usize,
    #[source]
    pub source: FailReason,
}

fn cancel_message(index: usize, count: usize, what: &str) -> String {
    format!("branch {index} out of {count} was {what}")
}

/// Merges `promises` with `merger` once every branch has settled with a
/// value.
///
/// # Examples
///
/// ```
/// use defer_action::{combine, Promise};
///
/// let parts = vec![Promise::of_value(1), Promise::of_value(2), Promise::of_value(3)];
/// let sum = combine(parts, |values| values.into_iter().sum::<i32>());
/// assert_eq!(sum.get_result().value(), Some(&6));
/// ```
pub fn combine<T, R, F>(promises: Vec<Promise<T>>, merger: F) -> Promise<R>
where
    T: Clone + Send + 'static,
    R: Clone + Send + 'static,
    F: Fn(Vec<T>) -> R + Send + Sync + 'static,
{
    let count = promises.len();
    let result: Promise<R> = Promise::not_started();
    result.start();

    if count == 0 {
        settle_merged(&result, &merger, Vec::new());
        return result;
    }

    let slots: Arc<Mutex<Vec<Option<T>>>> =
        Arc::new(Mutex::new((0..count).map(|_| None).collect()));
    let decided = Arc::new(AtomicBool::new(false));
    let unfilled = Arc::new(AtomicUsize::new(count));
    let merger = Arc::new(merger);
    let subscriptions: Arc<Mutex<Vec<Subscription<T>>>> =
        Arc::new(Mutex::new(Vec::with_capacity(count)));

    for (index, branch) in promises.iter().enumerate() {
        let result = result.clone();
        let slots = slots.clone();
        let decided = decided.clone();
        let unfilled = unfilled.clone();
        let merger = merger.clone();
        let subscriptions = subscriptions.clone();
        let subscriptions_outer = subscriptions.clone();
        let decided_outer = decided.clone();
        let subscription = branch.subscribe(Wait::forever(), move |outcome| match outcome {
            Outcome::Value(value) => {
                slots.lock()[index] = Some(value);
                if unfilled.fetch_sub(1, Ordering::AcqRel) == 1
                    && !decided.swap(true, Ordering::AcqRel)
                {
                    let values: Vec<T> = slots.lock().drain(..).flatten().collect();
                    settle_merged(&result, merger.as_ref(), values);
                }
            }
            Outcome::Failed(reason) => {
                if !decided.swap(true, Ordering::AcqRel) {
                    result.make_fail(FailReason::new(PartialFailure {
                        index,
                        count,
                        source: reason,
                    }));
                    detach_all(&subscriptions);
                }
            }
            Outcome::Cancelled(reason) => {
                if !decided.swap(true, Ordering::AcqRel) {
                    let message = cancel_message(index, count, "cancelled");
                    match reason.cause() {
                        Some(cause) => result.abort_because(message, cause.clone()),
                        None => result.abort_with(message),
                    };
                    detach_all(&subscriptions);
                }
            }
            Outcome::NotReady => {
                if !decided.swap(true, Ordering::AcqRel) {
                    result.abort_with(cancel_message(index, count, "not ready"));
                    detach_all(&subscriptions);
                }
            }
        });
        subscriptions_outer.lock().push(subscription);
        if decided_outer.load(Ordering::Acquire) {
            // the combine was decided while we were still wiring branches up;
            // detach whatever just got registered
            detach_all(&subscriptions_outer);
        }
    }

    for branch in &promises {
        branch.start();
    }

    result
}

fn settle_merged<T, R, F>(result: &Promise<R>, merger: &F, values: Vec<T>)
where
    R: Clone + Send + 'static,
    F: Fn(Vec<T>) -> R,
{
    match catch_unwind(AssertUnwindSafe(|| merger(values))) {
        Ok(merged) => {
            result.make_complete(merged);
        }
        Err(payload) => {
            result.make_fail(panic_reason(payload));
        }
    }
}

fn detach_all<T: Clone + Send + 'static>(subscriptions: &Mutex<Vec<Subscription<T>>>) {
    let detached = std::mem::take(&mut *subscriptions.lock());
    for subscription in detached {
        subscription.unsubscribe();
    }
}

/// Two-ary combine over differently-typed promises.
///
/// # Examples
///
/// ```
/// use defer_action::{combine2, Promise};
///
/// let area = combine2(Promise::of_value(6), Promise::of_value(7.0), |w, h| {
///     f64::from(w) * h
/// });
/// assert_eq!(area.get_result().value(), Some(&42.0));
/// ```
pub fn combine2<A, B, R, F>(pa: Promise<A>, pb: Promise<B>, merger: F) -> Promise<R>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    R: Clone + Send + 'static,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    let result: Promise<R> = Promise::not_started();
    result.start();

    let slots: Arc<Mutex<(Option<A>, Option<B>)>> = Arc::new(Mutex::new((None, None)));
    let decided = Arc::new(AtomicBool::new(false));
    let unfilled = Arc::new(AtomicUsize::new(2));
    let merger = Arc::new(merger);
    let subs: Arc<Mutex<(Option<Subscription<A>>, Option<Subscription<B>>)>> =
        Arc::new(Mutex::new((None, None)));

    let on_short_circuit = {
        let subs = subs.clone();
        Arc::new(move |result: &Promise<R>, index: usize, outcome_kind: ShortCircuit| {
            match outcome_kind {
                ShortCircuit::Failed(reason) => {
                    result.make_fail(FailReason::new(PartialFailure {
                        index,
                        count: 2,
                        source: reason,
                    }));
                }
                ShortCircuit::Cancelled(reason) => {
                    let message = cancel_message(index, 2, "cancelled");
                    match reason.cause() {
                        Some(cause) => result.abort_because(message, cause.clone()),
                        None => result.abort_with(message),
                    };
                }
                ShortCircuit::NotReady => {
                    result.abort_with(cancel_message(index, 2, "not ready"));
                }
            }
            let (sa, sb) = {
                let mut guard = subs.lock();
                (guard.0.take(), guard.1.take())
            };
            if let Some(s) = sa {
                s.unsubscribe();
            }
            if let Some(s) = sb {
                s.unsubscribe();
            }
        })
    };

    let try_merge = {
        let slots = slots.clone();
        let merger = merger.clone();
        let unfilled = unfilled.clone();
        let decided = decided.clone();
        Arc::new(move |result: &Promise<R>| {
            if unfilled.fetch_sub(1, Ordering::AcqRel) == 1 && !decided.swap(true, Ordering::AcqRel)
            {
                let (a, b) = {
                    let mut guard = slots.lock();
                    (guard.0.take(), guard.1.take())
                };
                if let (Some(a), Some(b)) = (a, b) {
                    match catch_unwind(AssertUnwindSafe(|| (*merger)(a, b))) {
                        Ok(merged) => {
                            result.make_complete(merged);
                        }
                        Err(payload) => {
                            result.make_fail(panic_reason(payload));
                        }
                    }
                }
            }
        })
    };

    let sub_a = {
        let result = result.clone();
        let slots = slots.clone();
        let decided = decided.clone();
        let short = on_short_circuit.clone();
        let merge = try_merge.clone();
        pa.subscribe(Wait::forever(), move |outcome| match outcome {
            Outcome::Value(value) => {
                slots.lock().0 = Some(value);
                (*merge)(&result);
            }
            Outcome::Failed(reason) => {
                if !decided.swap(true, Ordering::AcqRel) {
                    (*short)(&result, 0, ShortCircuit::Failed(reason));
                }
            }
            Outcome::Cancelled(reason) => {
                if !decided.swap(true, Ordering::AcqRel) {
                    (*short)(&result, 0, ShortCircuit::Cancelled(reason));
                }
            }
            Outcome::NotReady => {
                if !decided.swap(true, Ordering::AcqRel) {
                    (*short)(&result, 0, ShortCircuit::NotReady);
                }
            }
        })
    };
    let sub_b = {
        let result = result.clone();
        let slots = slots.clone();
        let decided = decided.clone();
        let short = on_short_circuit.clone();
        let merge = try_merge.clone();
        pb.subscribe(Wait::forever(), move |outcome| match outcome {
            Outcome::Value(value) => {
                slots.lock().1 = Some(value);
                (*merge)(&result);
            }
            Outcome::Failed(reason) => {
                if !decided.swap(true, Ordering::AcqRel) {
                    (*short)(&result, 1, ShortCircuit::Failed(reason));
                }
            }
            Outcome::Cancelled(reason) => {
                if !decided.swap(true, Ordering::AcqRel) {
                    (*short)(&result, 1, ShortCircuit::Cancelled(reason));
                }
            }
            Outcome::NotReady => {
                if !decided.swap(true, Ordering::AcqRel) {
                    (*short)(&result, 1, ShortCircuit::NotReady);
                }
            }
        })
    };

    {
        let mut guard = subs.lock();
        guard.0 = Some(sub_a);
        guard.1 = Some(sub_b);
    }
    if decided.load(Ordering::Acquire) {
        let (sa, sb) = {
            let mut guard = subs.lock();
            (guard.0.take(), guard.1.take())
        };
        if let Some(s) = sa {
            s.unsubscribe();
        }
        if let Some(s) = sb {
            s.unsubscribe();
        }
    }

    pa.start();
    pb.start();
    result
}

enum ShortCircuit {
    Failed(FailReason),
    Cancelled(CancelReason),
    NotReady,
}
