//! Cooperative cancellation.
//!
//! A [`CancelToken`] is handed to an action body when it runs. The body checks
//! it at safe points (or sleeps through [`CancelToken::wait`]); cancelling the
//! token also unparks the bound OS thread as a best-effort secondary signal.
//! Thread-level interruption alone cannot stop arbitrary blocking code, so the
//! flag is the contract and the unpark is only a nudge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    bound: Mutex<Option<Thread>>,
    gate: Mutex<()>,
    signal: Condvar,
}

/// A cloneable cancellation flag shared between an action body and whoever
/// may cancel it.
///
/// # Examples
///
/// ```
/// use defer_action::CancelToken;
///
/// let token = CancelToken::new();
/// assert!(!token.is_cancelled());
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Trips the flag, wakes any [`wait`](CancelToken::wait)er, and unparks
    /// the bound thread if there is one.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.signal.notify_all();
        if let Some(thread) = self.inner.bound.lock().as_ref() {
            thread.unpark();
        }
    }

    /// Records the calling thread as the one executing the body, so that a
    /// later [`cancel`](CancelToken::cancel) can unpark it. The binding is
    /// cleared when the returned guard drops; a thread that has moved on to
    /// unrelated work must not receive a stale nudge.
    pub fn bind_current_thread(&self) -> BoundThread {
        *self.inner.bound.lock() = Some(std::thread::current());
        BoundThread {
            token: self.clone(),
        }
    }

    /// Sleeps for `timeout` or until cancelled, whichever comes first.
    /// Returns `true` if the token was cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self.inner.gate.lock();
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return self.is_cancelled();
            }
            let _ = self.inner.signal.wait_for(&mut gate, deadline - now);
        }
    }
}

/// Clears the thread binding on drop.
pub struct BoundThread {
    token: CancelToken,
}

impl Drop for BoundThread {
    fn drop(&mut self) {
        *self.token.inner.bound.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_returns_early_on_cancel() {
        let token = CancelToken::new();
        let remote = token.clone();
        let waiter = thread::spawn(move || {
            let started = Instant::now();
            let cancelled = token.wait(Duration::from_secs(10));
            (cancelled, started.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        remote.cancel();
        let (cancelled, waited) = waiter.join().unwrap();
        assert!(cancelled);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn wait_times_out_when_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.wait(Duration::from_millis(10)));
    }

    #[test]
    fn binding_is_cleared_on_drop() {
        let token = CancelToken::new();
        {
            let _bound = token.bind_current_thread();
            assert!(token.inner.bound.lock().is_some());
        }
        assert!(token.inner.bound.lock().is_none());
    }
}
