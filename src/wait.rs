//! How long a subscriber is willing to wait for settlement, and what it gets
//! handed if the wait runs out first.

use std::sync::Arc;
use std::time::Duration;

use crate::outcome::Outcome;

/// Fallback applied to a subscription whose wait expired before the promise
/// settled.
#[derive(Clone)]
enum OnExpiry<T> {
    Cancel,
    Default(T),
    Supply(Arc<dyn Fn() -> T + Send + Sync>),
}

/// A subscriber-side wait policy.
///
/// `Wait::forever()` keeps the subscription armed until the promise settles.
/// `Wait::at_most(..)` arms a timer; if it fires first the subscription is
/// resolved with a fallback outcome (a cancellation by default) and detached
/// from the promise. The promise itself is not settled by an expiry.
///
/// # Examples
///
/// ```
/// use defer_action::Wait;
/// use std::time::Duration;
///
/// let _patient: Wait<i32> = Wait::forever();
/// let _bounded: Wait<i32> = Wait::at_most(Duration::from_millis(50));
/// let _lenient: Wait<i32> = Wait::at_most(Duration::from_millis(50)).or_value(-1);
/// ```
#[derive(Clone)]
pub struct Wait<T> {
    limit: Option<Duration>,
    on_expiry: OnExpiry<T>,
}

impl<T> Wait<T> {
    /// Wait for settlement no matter how long it takes.
    pub fn forever() -> Self {
        Wait {
            limit: None,
            on_expiry: OnExpiry::Cancel,
        }
    }

    /// Wait at most `limit`; on expiry the subscription resolves to a
    /// cancelled outcome.
    pub fn at_most(limit: Duration) -> Self {
        Wait {
            limit: Some(limit),
            on_expiry: OnExpiry::Cancel,
        }
    }

    /// On expiry, resolve with `value` instead of a cancellation.
    pub fn or_value(mut self, value: T) -> Self {
        self.on_expiry = OnExpiry::Default(value);
        self
    }

    /// On expiry, resolve with a value produced by `supplier`.
    pub fn or_else(mut self, supplier: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.on_expiry = OnExpiry::Supply(Arc::new(supplier));
        self
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }
}

impl<T: Clone> Wait<T> {
    /// The outcome handed to the subscriber when the wait expires.
    pub(crate) fn expiry_outcome(&self) -> Outcome<T> {
        match &self.on_expiry {
            OnExpiry::Cancel => Outcome::of_cancelled("wait expired"),
            OnExpiry::Default(v) => Outcome::Value(v.clone()),
            OnExpiry::Supply(f) => Outcome::Value((**f)()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forever_has_no_limit() {
        let w: Wait<i32> = Wait::forever();
        assert!(w.limit().is_none());
        assert!(w.expiry_outcome().is_cancelled());
    }

    #[test]
    fn bounded_wait_defaults_to_cancel() {
        let w: Wait<i32> = Wait::at_most(Duration::from_millis(5));
        assert_eq!(w.limit(), Some(Duration::from_millis(5)));
        let fallback = w.expiry_outcome();
        assert_eq!(
            fallback.cancel_reason().unwrap().message(),
            Some("wait expired")
        );
    }

    #[test]
    fn fallback_value_and_supplier() {
        let w = Wait::at_most(Duration::from_millis(5)).or_value(7);
        assert_eq!(w.expiry_outcome().value(), Some(&7));

        let w = Wait::at_most(Duration::from_millis(5)).or_else(|| 9);
        assert_eq!(w.expiry_outcome().value(), Some(&9));
    }
}
