//! The settled result of an action: a value, a failure, a cancellation, or
//! not-ready-yet. An [`Outcome`] is immutable and cheap to clone, so one
//! settlement can be fanned out to any number of subscribers.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error type accepted at the API boundary (supplier failures etc).
pub type BoxError = Box<dyn Error + Send + Sync>;

/// A shared, cloneable failure cause.
///
/// Wraps the original error in an `Arc` so that a single failure can be
/// delivered to every subscriber of a promise without requiring the error
/// type itself to be `Clone`.
#[derive(Clone)]
pub struct FailReason(Arc<dyn Error + Send + Sync>);

impl FailReason {
    /// Wraps an error value.
    pub fn new<E: Error + Send + Sync + 'static>(err: E) -> Self {
        FailReason(Arc::new(err))
    }

    /// Wraps a plain message, for failures that have no richer error value
    /// (panic payloads, mostly).
    pub fn msg(message: impl Into<String>) -> Self {
        FailReason(Arc::new(MessageError(message.into())))
    }

    /// Borrows the underlying error.
    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }

    /// Downcasts the underlying error to a concrete type.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl From<BoxError> for FailReason {
    fn from(err: BoxError) -> Self {
        FailReason(Arc::from(err))
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FailReason({})", self.0)
    }
}

// lets a FailReason sit in another error's #[source] chain
impl Error for FailReason {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        let inner: &(dyn Error + 'static) = &*self.0;
        Some(inner)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct MessageError(String);

/// Why a promise was cancelled: an optional human-readable message and an
/// optional originating cause.
#[derive(Debug, Clone, Default)]
pub struct CancelReason {
    message: Option<String>,
    cause: Option<FailReason>,
}

impl CancelReason {
    /// A cancellation with no further context.
    pub fn unspecified() -> Self {
        CancelReason::default()
    }

    /// A cancellation explained by a message.
    pub fn with_message(message: impl Into<String>) -> Self {
        CancelReason {
            message: Some(message.into()),
            cause: None,
        }
    }

    /// A cancellation explained by a message and an originating cause.
    pub fn with_cause(message: impl Into<String>, cause: FailReason) -> Self {
        CancelReason {
            message: Some(message.into()),
            cause: Some(cause),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn cause(&self) -> Option<&FailReason> {
        self.cause.as_ref()
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.cause) {
            (Some(m), Some(c)) => write!(f, "{m} (cause: {c})"),
            (Some(m), None) => write!(f, "{m}"),
            (None, _) => write!(f, "cancelled"),
        }
    }
}

/// The four-variant settled result of an action.
///
/// # Examples
///
/// ```
/// use defer_action::Outcome;
///
/// let done = Outcome::of_value(42);
/// assert!(done.is_value());
/// assert_eq!(done.value(), Some(&42));
///
/// let cancelled: Outcome<i32> = Outcome::of_cancelled("nobody cares");
/// assert!(cancelled.is_cancelled());
/// assert_eq!(cancelled.value(), None);
/// ```
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The action produced a value.
    Value(T),
    /// The action's body failed.
    Failed(FailReason),
    /// The action was cancelled before producing a value.
    Cancelled(CancelReason),
    /// The action has not produced anything yet.
    NotReady,
}

impl<T> Outcome<T> {
    pub fn of_value(value: T) -> Self {
        Outcome::Value(value)
    }

    pub fn of_error(err: impl Into<FailReason>) -> Self {
        Outcome::Failed(err.into())
    }

    pub fn of_cancelled(message: impl Into<String>) -> Self {
        Outcome::Cancelled(CancelReason::with_message(message))
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled(_))
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, Outcome::NotReady)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn fail_reason(&self) -> Option<&FailReason> {
        match self {
            Outcome::Failed(r) => Some(r),
            _ => None,
        }
    }

    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            Outcome::Cancelled(r) => Some(r),
            _ => None,
        }
    }

    /// Transforms the value, leaving the other variants untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            other => other.carry_over(),
        }
    }

    /// Re-types a non-value outcome. Used when forwarding a parent promise's
    /// failure or cancellation into a derived promise of a different type.
    ///
    /// Returns `NotReady` for `Value` instead of panicking; callers match on
    /// `Value` first.
    pub(crate) fn carry_over<U>(self) -> Outcome<U> {
        match self {
            Outcome::Value(_) => Outcome::NotReady,
            Outcome::Failed(r) => Outcome::Failed(r),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::NotReady => Outcome::NotReady,
        }
    }
}

/// Converts a panic payload into a failure cause, best effort.
pub(crate) fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> FailReason {
    if let Some(s) = payload.downcast_ref::<&str>() {
        FailReason::msg(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        FailReason::msg(s.clone())
    } else {
        FailReason::msg("panicked")
    }
}
