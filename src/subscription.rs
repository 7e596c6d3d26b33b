//! Subscription tokens.
//!
//! A [`Subscription`] identifies one entry in a promise's listener registry.
//! It carries no state of its own beyond identity and a back-reference to the
//! promise for status queries; its one real job is [`Subscription::unsubscribe`].

use crate::promise::Promise;

/// Which registry a listener lives in. Eavesdroppers observe settlement but
/// never count toward subscriber-driven auto-abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerKind {
    Subscriber,
    Eavesdropper,
}

/// Handle to one registered listener of a [`Promise`].
pub struct Subscription<T> {
    promise: Promise<T>,
    id: u64,
    kind: ListenerKind,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub(crate) fn new(promise: Promise<T>, id: u64, kind: ListenerKind) -> Self {
        Subscription { promise, id, kind }
    }

    /// The promise this subscription belongs to.
    pub fn promise(&self) -> &Promise<T> {
        &self.promise
    }

    /// Whether the promise has settled.
    pub fn is_settled(&self) -> bool {
        self.promise.is_done()
    }

    /// Whether this listener is still registered (not yet delivered, expired,
    /// or unsubscribed).
    pub fn is_active(&self) -> bool {
        self.promise.has_listener(self.id, self.kind)
    }

    /// Detaches the listener. Removing the last real subscriber of an
    /// unsettled promise aborts it: a computation nobody is waiting for
    /// should not keep running.
    pub fn unsubscribe(self) {
        self.promise.remove_listener(self.id, self.kind);
    }
}
