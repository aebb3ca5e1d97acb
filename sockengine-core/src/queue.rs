//! The tri-state I/O queue.
//!
//! A queue buffer moves through exactly one of three states at a time:
//! `ready` (available for submission), `inprogress` (submitted to the host
//! networking primitive, awaiting completion) and `done` (completed,
//! awaiting consumption by the caller). All list manipulation happens under
//! a single per-queue mutex, mirroring the original C queue's lock-protected
//! doubly-linked lists (`ready`/`inprogress`/`done`).
//!
//! Grounded 1:1 on the tri-state queue design: buffers are created
//! independently of any state list (`create_buffer`), then explicitly placed
//! into one (`set_ready`/`set_inprogress`/`set_done`). `rollback` recovers
//! in-flight buffers after a failed submission batch by moving them back to
//! the front of `ready`, preserving their relative order. `abort` walks every
//! list in `done`, `inprogress`, `ready` order and fires each buffer's abort
//! callback exactly once, without removing the buffer — the buffer is still
//! owned by whichever path will eventually pop and release it.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::alloc::{IoArena, SlabMut};
use crate::error::EngineError;
use crate::options::QueueOptions;

/// Which of the three queue states a buffer currently occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSlot {
    /// Available for submission.
    Ready,
    /// Submitted to the host, awaiting completion.
    InProgress,
    /// Completed, awaiting consumption.
    Done,
}

/// A single buffer moving through the queue's tri-state lifecycle.
///
/// Holds a mutable arena slab for the payload plus independent read/write
/// cursors, so a buffer can be filled incrementally (writer side) and
/// drained incrementally (reader side) without reallocating.
pub struct QueueBuffer {
    id: u64,
    slot: QueueSlot,
    slab: SlabMut,
    write_cursor: usize,
    read_cursor: usize,
    abort_cb: Option<Box<dyn FnOnce() + Send>>,
}

impl QueueBuffer {
    /// Opaque identity, stable for the buffer's whole lifetime. Useful for
    /// correlating a buffer across begin/complete callback boundaries.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Which state list this buffer currently belongs to.
    #[must_use]
    pub fn slot(&self) -> QueueSlot {
        self.slot
    }

    /// Total capacity of the backing slab.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slab.capacity()
    }

    /// Bytes written so far (the writer's high-water mark).
    #[must_use]
    pub fn written_len(&self) -> usize {
        self.write_cursor
    }

    /// Bytes read so far.
    #[must_use]
    pub fn read_len(&self) -> usize {
        self.read_cursor
    }

    /// Attach a callback that fires exactly once if the queue is aborted
    /// while this buffer is outstanding. Overwrites any previously attached
    /// callback.
    pub fn on_abort<F>(&mut self, cb: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.abort_cb = Some(Box::new(cb));
    }

    /// Copy `data` into the buffer starting at the write cursor, bounded by
    /// remaining capacity. Returns the number of bytes actually written and
    /// advances the cursor by that amount.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let cap = self.slab.capacity();
        let remaining = cap.saturating_sub(self.write_cursor);
        let n = data.len().min(remaining);
        if n > 0 {
            let dst = &mut self.slab.as_mut_slice()[self.write_cursor..self.write_cursor + n];
            dst.copy_from_slice(&data[..n]);
            self.write_cursor += n;
            self.slab.set_len(self.write_cursor);
        }
        n
    }

    /// Copy up to `out.len()` bytes starting at the read cursor into `out`,
    /// bounded by the bytes written so far. Returns the number of bytes
    /// actually read and advances the cursor by that amount.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let available = self.write_cursor.saturating_sub(self.read_cursor);
        let n = out.len().min(available);
        if n > 0 {
            let src = &self.slab.as_slice()[self.read_cursor..self.read_cursor + n];
            out[..n].copy_from_slice(src);
            self.read_cursor += n;
        }
        n
    }

    fn take_abort_cb(&mut self) -> Option<Box<dyn FnOnce() + Send>> {
        self.abort_cb.take()
    }
}

impl std::fmt::Debug for QueueBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueBuffer")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("write_cursor", &self.write_cursor)
            .field("read_cursor", &self.read_cursor)
            .finish_non_exhaustive()
    }
}

struct Inner {
    arena: IoArena,
    ready: VecDeque<QueueBuffer>,
    inprogress: VecDeque<QueueBuffer>,
    done: VecDeque<QueueBuffer>,
    next_id: u64,
}

/// A tri-state I/O queue. One instance backs each direction (send/recv) of
/// an async operation context.
pub struct IoQueue {
    inner: Mutex<Inner>,
    options: QueueOptions,
}

impl IoQueue {
    /// Create an empty queue with the given configuration.
    #[must_use]
    pub fn create(options: QueueOptions) -> Self {
        Self {
            inner: Mutex::new(Inner {
                arena: IoArena::new(),
                ready: VecDeque::new(),
                inprogress: VecDeque::new(),
                done: VecDeque::new(),
                next_id: 0,
            }),
            options,
        }
    }

    /// Allocate a fresh buffer of `size` bytes, not yet placed in any state
    /// list. The caller must call one of `set_ready`/`set_inprogress`/
    /// `set_done` to make it visible to consumers.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::Fault`] if `size` is zero or larger than a
    /// single arena page, and [`EngineError::OutOfMemory`] if the
    /// allocation itself fails. Never silently truncates the request.
    pub fn create_buffer(&self, size: usize) -> Result<QueueBuffer, EngineError> {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        let slab = inner.arena.alloc_mut(size)?;
        inner.next_id += 1;
        Ok(QueueBuffer {
            id,
            slot: QueueSlot::Ready,
            slab,
            write_cursor: 0,
            read_cursor: 0,
            abort_cb: None,
        })
    }

    /// The configuration this queue was created with.
    #[must_use]
    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    /// Move `buf` to the `ready` state, pushed to the tail.
    pub fn set_ready(&self, mut buf: QueueBuffer) {
        buf.slot = QueueSlot::Ready;
        self.inner.lock().ready.push_back(buf);
    }

    /// Move `buf` to the `inprogress` state, pushed to the tail.
    pub fn set_inprogress(&self, mut buf: QueueBuffer) {
        buf.slot = QueueSlot::InProgress;
        self.inner.lock().inprogress.push_back(buf);
    }

    /// Move `buf` to the `done` state, pushed to the tail.
    pub fn set_done(&self, mut buf: QueueBuffer) {
        buf.slot = QueueSlot::Done;
        self.inner.lock().done.push_back(buf);
    }

    /// Whether any buffer is currently ready.
    #[must_use]
    pub fn has_ready(&self) -> bool {
        !self.inner.lock().ready.is_empty()
    }

    /// Whether any buffer is currently in progress.
    #[must_use]
    pub fn has_inprogress(&self) -> bool {
        !self.inner.lock().inprogress.is_empty()
    }

    /// Whether any buffer is currently done.
    #[must_use]
    pub fn has_done(&self) -> bool {
        !self.inner.lock().done.is_empty()
    }

    /// Pop the head of the `ready` list, if any.
    pub fn pop_ready(&self) -> Option<QueueBuffer> {
        self.inner.lock().ready.pop_front()
    }

    /// Pop the head of the `inprogress` list, if any.
    pub fn pop_inprogress(&self) -> Option<QueueBuffer> {
        self.inner.lock().inprogress.pop_front()
    }

    /// Pop the head of the `done` list, if any.
    pub fn pop_done(&self) -> Option<QueueBuffer> {
        self.inner.lock().done.pop_front()
    }

    /// Move every buffer currently `inprogress` back to `ready`, prepended
    /// in front of whatever was already ready, preserving their relative
    /// order. Used when a submission batch fails after some buffers were
    /// already marked in-flight.
    pub fn rollback(&self) {
        let mut inner = self.inner.lock();
        let drained: VecDeque<QueueBuffer> = inner.inprogress.drain(..).collect();
        for buf in drained.into_iter().rev() {
            let mut buf = buf;
            buf.slot = QueueSlot::Ready;
            inner.ready.push_front(buf);
        }
    }

    /// Fire the abort callback of every outstanding buffer, in `done`,
    /// `inprogress`, `ready` order, without removing any buffer from its
    /// list. Idempotent: a buffer whose callback already fired (or was
    /// never set) is left untouched on a repeat call.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        for buf in inner.done.iter_mut() {
            if let Some(cb) = buf.take_abort_cb() {
                cb();
            }
        }
        for buf in inner.inprogress.iter_mut() {
            if let Some(cb) = buf.take_abort_cb() {
                cb();
            }
        }
        for buf in inner.ready.iter_mut() {
            if let Some(cb) = buf.take_abort_cb() {
                cb();
            }
        }
    }

    /// Release every buffer in the queue, in `done`, `inprogress`, `ready`
    /// order, firing each buffer's abort callback (if still registered)
    /// before dropping it, leaving all three lists empty.
    pub fn release_all(&self) {
        let mut inner = self.inner.lock();
        for buf in inner.done.iter_mut() {
            if let Some(cb) = buf.take_abort_cb() {
                cb();
            }
        }
        for buf in inner.inprogress.iter_mut() {
            if let Some(cb) = buf.take_abort_cb() {
                cb();
            }
        }
        for buf in inner.ready.iter_mut() {
            if let Some(cb) = buf.take_abort_cb() {
                cb();
            }
        }
        inner.done.clear();
        inner.inprogress.clear();
        inner.ready.clear();
    }

    /// Release a single buffer obtained from this queue without placing it
    /// back into any state list, firing its abort callback first if still
    /// registered.
    pub fn buffer_release(&self, mut buf: QueueBuffer) {
        if let Some(cb) = buf.take_abort_cb() {
            cb();
        }
        // Dropping the buffer is then sufficient: SlabMut's backing page is
        // refcounted and freed once the last reference (including any
        // frozen `Bytes` clones) goes away.
    }

    /// Destroy the queue, releasing every outstanding buffer first.
    pub fn free(self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn queue() -> IoQueue {
        IoQueue::create(QueueOptions::default())
    }

    #[test]
    fn buffer_starts_in_no_list_but_transitions_through_states() {
        let q = queue();
        assert!(!q.has_ready() && !q.has_inprogress() && !q.has_done());

        let buf = q.create_buffer(64).unwrap();
        q.set_ready(buf);
        assert!(q.has_ready());

        let buf = q.pop_ready().unwrap();
        assert_eq!(buf.slot(), QueueSlot::Ready);
        q.set_inprogress(buf);
        assert!(!q.has_ready());
        assert!(q.has_inprogress());

        let buf = q.pop_inprogress().unwrap();
        q.set_done(buf);
        assert!(!q.has_inprogress());
        assert!(q.has_done());

        let buf = q.pop_done().unwrap();
        assert_eq!(buf.slot(), QueueSlot::Done);
    }

    #[test]
    fn write_then_read_round_trips_bounded_by_capacity() {
        let q = queue();
        let mut buf = q.create_buffer(8).unwrap();
        assert_eq!(buf.write(b"hello world"), 8); // truncated to capacity
        assert_eq!(buf.written_len(), 8);

        let mut out = [0u8; 16];
        let n = buf.read(&mut out);
        assert_eq!(n, 8);
        assert_eq!(&out[..8], b"hello wo");

        // Further reads return nothing once the write cursor is drained.
        assert_eq!(buf.read(&mut out), 0);
    }

    #[test]
    fn rollback_prepends_inprogress_to_ready_preserving_order() {
        let q = queue();
        for i in 0..3u8 {
            let mut buf = q.create_buffer(4).unwrap();
            buf.write(&[i]);
            q.set_inprogress(buf);
        }
        let mut existing_ready = q.create_buffer(4).unwrap();
        existing_ready.write(&[9]);
        q.set_ready(existing_ready);

        q.rollback();
        assert!(!q.has_inprogress());

        let mut order = Vec::new();
        while let Some(mut buf) = q.pop_ready() {
            let mut b = [0u8; 1];
            buf.read(&mut b);
            order.push(b[0]);
        }
        assert_eq!(order, vec![0, 1, 2, 9]);
    }

    #[test]
    fn abort_fires_callbacks_without_removing_buffers() {
        let q = queue();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut ready_buf = q.create_buffer(4).unwrap();
        let f = fired.clone();
        ready_buf.on_abort(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        q.set_ready(ready_buf);

        let mut inprogress_buf = q.create_buffer(4).unwrap();
        let f = fired.clone();
        inprogress_buf.on_abort(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        q.set_inprogress(inprogress_buf);

        q.abort();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert!(q.has_ready());
        assert!(q.has_inprogress());

        // Idempotent: a second abort does not double-fire.
        q.abort();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn release_all_empties_every_list() {
        let q = queue();
        q.set_ready(q.create_buffer(4).unwrap());
        q.set_inprogress(q.create_buffer(4).unwrap());
        q.set_done(q.create_buffer(4).unwrap());

        q.release_all();
        assert!(!q.has_ready());
        assert!(!q.has_inprogress());
        assert!(!q.has_done());
    }

    #[test]
    fn release_all_fires_abort_callbacks_for_every_outstanding_buffer() {
        let q = queue();
        let fired = Arc::new(AtomicUsize::new(0));

        for buf in [q.create_buffer(4).unwrap(), q.create_buffer(4).unwrap()] {
            let mut buf = buf;
            let f = fired.clone();
            buf.on_abort(move || {
                f.fetch_add(1, Ordering::SeqCst);
            });
            q.set_ready(buf);
        }
        let mut done_buf = q.create_buffer(4).unwrap();
        let f = fired.clone();
        done_buf.on_abort(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        q.set_done(done_buf);

        q.release_all();
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn buffer_release_fires_its_abort_callback() {
        let q = queue();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut buf = q.create_buffer(4).unwrap();
        let f = fired.clone();
        buf.on_abort(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        q.buffer_release(buf);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn create_buffer_rejects_zero_and_oversized_requests() {
        let q = queue();
        assert!(matches!(q.create_buffer(0), Err(EngineError::Fault)));
        assert!(matches!(
            q.create_buffer(crate::alloc::PAGE_SIZE + 1),
            Err(EngineError::Fault)
        ));
    }
}
