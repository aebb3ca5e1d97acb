//! The readiness-style substrate: the non-completion-port half of the
//! engine's "either completion-port style or readiness style" requirement.
//!
//! Grounded on the original PAL's event-port contract
//! (`pal_event_port_create`/`_register`/`pal_event_select`/`_clear`/`_close`):
//! a port owns a set of registered sockets, each socket registers interest
//! in read/write/close/error events, and the port delivers them through a
//! single callback. [`PollSubstrate`] is the Rust shape of that contract; an
//! engine built against it drives sends/receives from readiness
//! notifications rather than from completion callbacks, without touching
//! [`crate::context::AsyncOperationContext`]'s begin/complete protocol.

use std::io;

/// The kind of readiness event a registered socket can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessEvent {
    /// The socket has data to read or, for a listener, a connection to accept.
    Readable,
    /// The socket can accept more outbound data without blocking.
    Writable,
    /// The peer closed its side of the connection.
    Closed,
    /// An error occurred; the socket should be torn down.
    Error,
}

/// A readiness-style event port: owns a set of registered sockets and
/// delivers readiness notifications for the events each one selected.
pub trait PollSubstrate: Send {
    /// Opaque handle identifying a socket registered with this port.
    type Handle: Copy + Send;

    /// Register `fd` with the port. Returns a handle used for subsequent
    /// `select`/`clear`/`close` calls. No events are delivered until
    /// `select` is called for at least one event kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the port rejects the registration (e.g. closed).
    fn register(&mut self, fd: std::os::fd::RawFd) -> io::Result<Self::Handle>;

    /// Start delivering `event` for `handle`.
    fn select(&mut self, handle: Self::Handle, event: ReadinessEvent) -> io::Result<()>;

    /// Stop delivering `event` for `handle`.
    fn clear(&mut self, handle: Self::Handle, event: ReadinessEvent) -> io::Result<()>;

    /// Deregister `handle`. Idempotent.
    fn close(&mut self, handle: Self::Handle);

    /// Block until at least one registered socket reports a selected event,
    /// or `on_idle` has been invoked because the wait produced nothing.
    /// Returns the events observed this cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying poll mechanism fails.
    fn wait(&mut self) -> io::Result<Vec<(Self::Handle, ReadinessEvent)>>;

    /// Housekeeping hook invoked when a poll cycle delivers no events at
    /// all. The completion-based path has no equivalent — this is purely a
    /// readiness-substrate concern, mirroring the original PAL's
    /// `pal_timeout_handler_t` threaded through event-port creation.
    fn on_idle(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// A fake readiness substrate backed by an in-memory table, used to
    /// exercise engine code written against `PollSubstrate` without a real
    /// OS poll mechanism.
    struct FakePort {
        next_handle: u32,
        selected: HashMap<u32, Vec<ReadinessEvent>>,
        pending: Vec<(u32, ReadinessEvent)>,
        idle_calls: u32,
    }

    impl FakePort {
        fn new() -> Self {
            Self {
                next_handle: 0,
                selected: HashMap::new(),
                pending: Vec::new(),
                idle_calls: 0,
            }
        }

        fn deliver(&mut self, handle: u32, event: ReadinessEvent) {
            if self
                .selected
                .get(&handle)
                .is_some_and(|events| events.contains(&event))
            {
                self.pending.push((handle, event));
            }
        }
    }

    impl PollSubstrate for FakePort {
        type Handle = u32;

        fn register(&mut self, _fd: std::os::fd::RawFd) -> io::Result<u32> {
            let handle = self.next_handle;
            self.next_handle += 1;
            self.selected.insert(handle, Vec::new());
            Ok(handle)
        }

        fn select(&mut self, handle: u32, event: ReadinessEvent) -> io::Result<()> {
            self.selected.entry(handle).or_default().push(event);
            Ok(())
        }

        fn clear(&mut self, handle: u32, event: ReadinessEvent) -> io::Result<()> {
            if let Some(events) = self.selected.get_mut(&handle) {
                events.retain(|e| *e != event);
            }
            Ok(())
        }

        fn close(&mut self, handle: u32) {
            self.selected.remove(&handle);
        }

        fn wait(&mut self) -> io::Result<Vec<(u32, ReadinessEvent)>> {
            if self.pending.is_empty() {
                self.on_idle();
                return Ok(Vec::new());
            }
            Ok(std::mem::take(&mut self.pending))
        }

        fn on_idle(&mut self) {
            self.idle_calls += 1;
        }
    }

    #[test]
    fn only_selected_events_are_delivered() {
        let mut port = FakePort::new();
        let handle = port.register(0).unwrap();
        port.select(handle, ReadinessEvent::Readable).unwrap();

        port.deliver(handle, ReadinessEvent::Writable); // not selected
        assert_eq!(port.wait().unwrap(), Vec::new());

        port.deliver(handle, ReadinessEvent::Readable);
        assert_eq!(port.wait().unwrap(), vec![(handle, ReadinessEvent::Readable)]);
    }

    #[test]
    fn idle_hook_fires_on_empty_wait() {
        let mut port = FakePort::new();
        port.wait().unwrap();
        port.wait().unwrap();
        assert_eq!(port.idle_calls, 2);
    }

    #[test]
    fn clear_stops_delivery() {
        let mut port = FakePort::new();
        let handle = port.register(0).unwrap();
        port.select(handle, ReadinessEvent::Readable).unwrap();
        port.clear(handle, ReadinessEvent::Readable).unwrap();

        port.deliver(handle, ReadinessEvent::Readable);
        assert_eq!(port.wait().unwrap(), Vec::new());
    }
}
