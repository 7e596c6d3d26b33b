//! Best-effort interrupt bookkeeping for a tree of actions.
//!
//! A [`RunnerScope`] records which threads are currently executing bodies
//! spawned under it, together with their cancel tokens, so an ancestor can
//! fan out [`interrupt_all`](RunnerScope::interrupt_all) to every descendant.
//! The variants differ only in *when* that fan-out fires: never (`NoOp`),
//! at process shutdown by the caller's hand (`Global`), when the scope's own
//! work completes (`Local`), or as soon as the first sub-action completes
//! (`Nested` - cuts off the rest of a race once one branch wins).
//!
//! This is cooperative and best effort, not structured concurrency: a body
//! that never checks its token will run to completion regardless.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::Thread;

use parking_lot::Mutex;

use crate::cancel::CancelToken;

/// When a scope fans out its interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Tracks nothing, interrupts nothing.
    NoOp,
    /// Process-lifetime registry; the owner calls `interrupt_all` at shutdown.
    Global,
    /// Interrupts all tracked threads when the scope's own work completes
    /// (see [`RunnerScope::scoped`]).
    Local,
    /// Interrupts all tracked threads as soon as the first sub-action
    /// completes.
    Nested,
}

struct Entry {
    id: u64,
    thread: Thread,
    token: CancelToken,
}

/// Registry of threads executing bodies under one logical action tree.
pub struct RunnerScope {
    kind: ScopeKind,
    registry: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
    fired: AtomicBool,
}

impl RunnerScope {
    pub fn new(kind: ScopeKind) -> Arc<Self> {
        Arc::new(RunnerScope {
            kind,
            registry: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fired: AtomicBool::new(false),
        })
    }

    pub fn no_op() -> Arc<Self> {
        RunnerScope::new(ScopeKind::NoOp)
    }

    pub fn global() -> Arc<Self> {
        RunnerScope::new(ScopeKind::Global)
    }

    pub fn local() -> Arc<Self> {
        RunnerScope::new(ScopeKind::Local)
    }

    pub fn nested() -> Arc<Self> {
        RunnerScope::new(ScopeKind::Nested)
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// How many bodies are currently tracked.
    pub fn tracked(&self) -> usize {
        self.registry.lock().len()
    }

    /// Registers the calling thread as executing a body under this scope.
    /// The entry is removed when the returned guard drops (the body finished,
    /// however it finished).
    pub fn enter(self: &Arc<Self>, token: &CancelToken) -> ScopeGuard {
        if self.kind == ScopeKind::NoOp {
            return ScopeGuard {
                scope: self.clone(),
                id: 0,
            };
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().push(Entry {
            id,
            thread: std::thread::current(),
            token: token.clone(),
        });
        ScopeGuard {
            scope: self.clone(),
            id,
        }
    }

    /// Trips every tracked token and unparks every tracked thread, then
    /// clears the registry.
    pub fn interrupt_all(&self) {
        let entries = std::mem::take(&mut *self.registry.lock());
        if !entries.is_empty() {
            log::debug!("scope interrupting {} tracked thread(s)", entries.len());
        }
        for entry in entries {
            entry.token.cancel();
            entry.thread.unpark();
        }
    }

    /// Runs `work`, then interrupts everything still tracked - the `Local`
    /// variant's trigger point.
    pub fn scoped<R>(&self, work: impl FnOnce() -> R) -> R {
        let result = work();
        self.interrupt_all();
        result
    }

    fn on_body_finished(&self) {
        if self.kind == ScopeKind::Nested && !self.fired.swap(true, Ordering::AcqRel) {
            self.interrupt_all();
        }
    }
}

/// Deregisters a tracked body on drop.
pub struct ScopeGuard {
    scope: Arc<RunnerScope>,
    id: u64,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.id != 0 {
            self.scope.registry.lock().retain(|e| e.id != self.id);
        }
        self.scope.on_body_finished();
    }
}
