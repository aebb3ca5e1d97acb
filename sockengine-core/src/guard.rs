//! RAII guard protecting the async operation context's pending counter.
//!
//! # The problem
//!
//! Every async operation context (open/send/recv) tracks a pending counter:
//! the number of outstanding submissions against the host networking
//! primitive. The counter must decrement exactly once per completion, even
//! if the completion handler returns early or panics while translating the
//! result. A missed decrement wedges the context in a permanently "pending"
//! state; a double decrement underflows it and corrupts close-drain
//! quiescence detection.
//!
//! # The solution
//!
//! `PendingGuard` bumps the counter by one on construction and decrements it
//! on drop, exactly once, regardless of how the scope is exited. Call
//! [`PendingGuard::disarm`] only when the caller itself takes over the
//! decrement (the close-drain synthetic-bump scheme in
//! `sockengine::context` is the one place that does this).

use std::sync::atomic::{AtomicUsize, Ordering};

/// Guards a pending counter across a single submission/completion cycle.
pub struct PendingGuard<'a> {
    counter: &'a AtomicUsize,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    /// Increment `counter` and arm the guard to decrement it on drop.
    #[inline]
    pub fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self {
            counter,
            armed: true,
        }
    }

    /// Disarm the guard without decrementing the counter.
    ///
    /// The caller becomes responsible for the matching decrement. Used only
    /// when a synthetic bump must outlive this guard's scope (close-drain
    /// handoff).
    #[inline]
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Current value of the guarded counter.
    #[must_use]
    pub fn count(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.counter.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
