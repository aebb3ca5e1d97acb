//! The async operation context: per-direction (open/send/recv) completion
//! bookkeeping, grounded on the original PAL's `pal_socket_async_t` — a
//! pending counter plus begin/complete handler pair attached to each
//! direction of a socket.
//!
//! The original drives this with a manual `while (begin()) {}` loop and a
//! pair of C function pointers swapped at runtime (e.g. swapping a
//! direction's begin handler to the close-drain handler to cancel it). Rust
//! gives us real coroutines: an `async fn` with a loop inside it *is* that
//! manual continuation machinery, so [`AsyncOperationContext`] only keeps
//! what async/await cannot give us for free — the pending counter used to
//! detect quiescence during close, and the synthetic bump/un-bump dance that
//! makes that detection race-free across a cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::Poll;

use futures::task::AtomicWaker;

use sockengine_core::guard::PendingGuard;

/// Per-direction completion bookkeeping for one of a socket's open/send/recv
/// operations.
#[derive(Default)]
pub struct AsyncOperationContext {
    pending: AtomicUsize,
}

impl AsyncOperationContext {
    /// A fresh, quiescent context.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: AtomicUsize::new(0),
        }
    }

    /// Current pending count. Zero means quiescent: no submission is
    /// outstanding and no synthetic close-drain bump is active.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether this context is quiescent.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.pending_count() == 0
    }

    /// Arm a [`PendingGuard`] around a single submission. Hold it for the
    /// lifetime of the in-flight host call; it decrements the counter on
    /// drop regardless of how the call ends (success, error, or the task
    /// being dropped out from under it by cancellation).
    #[must_use]
    pub fn guard(&self) -> PendingGuard<'_> {
        PendingGuard::new(&self.pending)
    }

    /// Apply the synthetic pre-swap bump documented for close-drain
    /// (`original_source`'s `pal_socket_async_close_begin`): called once,
    /// before the direction's task is cancelled, so the quiescence check
    /// cannot observe a false "drained" state between the cancellation
    /// request and the task actually stopping.
    pub fn begin_close_drain(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Un-bump the synthetic close-drain unit. Called exactly once, as the
    /// first action after the direction's task has actually stopped
    /// (confirmed dropped/joined), restoring the counter to what it would
    /// have been had no synthetic bump occurred.
    pub fn end_close_drain(&self) {
        let prev = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "close-drain un-bump without a matching bump");
    }
}

/// A single-slot wake signal, used to resume a quiesced send/recv direction
/// when the caller calls `Socket::can_send`/`can_recv`.
///
/// Grounded on the original PAL's `pal_socket_can_send`/`can_recv`: the only
/// way a direction that returned "nothing to submit" resumes is an explicit
/// poke from the caller.
pub struct Signal {
    waker: AtomicWaker,
    ready: AtomicBool,
}

impl Signal {
    /// A signal with no pending notification.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            waker: AtomicWaker::new(),
            ready: AtomicBool::new(false),
        })
    }

    /// Wake a waiter, if any, or arm the next `wait()` to return immediately
    /// if none is currently waiting.
    pub fn notify(&self) {
        self.ready.store(true, Ordering::Release);
        self.waker.wake();
    }

    /// Wait for a notification, consuming it.
    pub async fn wait(&self) {
        std::future::poll_fn(|cx| {
            self.waker.register(cx.waker());
            if self.ready.swap(false, Ordering::AcqRel) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_quiescence_on_drop() {
        let ctx = AsyncOperationContext::new();
        assert!(ctx.is_quiescent());
        {
            let _g = ctx.guard();
            assert!(!ctx.is_quiescent());
        }
        assert!(ctx.is_quiescent());
    }

    #[test]
    fn close_drain_bump_survives_across_cancellation_window() {
        let ctx = AsyncOperationContext::new();
        assert!(ctx.is_quiescent());

        // Simulate an in-flight submission.
        let guard = ctx.guard();
        // Close is requested: bump before cancelling the task.
        ctx.begin_close_drain();
        assert_eq!(ctx.pending_count(), 2);

        // The in-flight submission's guard drops (task cancelled).
        drop(guard);
        // Still not quiescent: the synthetic bump holds it open.
        assert!(!ctx.is_quiescent());

        // The drain handler's first action un-bumps it.
        ctx.end_close_drain();
        assert!(ctx.is_quiescent());
    }

    #[compio::test]
    async fn signal_wait_resumes_after_notify() {
        let signal = Signal::new();
        signal.notify();
        signal.wait().await; // must not hang: notify happened-before wait
    }
}
