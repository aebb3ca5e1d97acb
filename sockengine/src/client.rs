//! The client interface: the trait a caller implements to drive a
//! [`crate::socket::Socket`] and receive its lifecycle/I/O events.
//!
//! Grounded on the shape of a split actor interface — a small set of
//! `begin_*`/event callbacks rather than a single fat event enum, mirroring
//! how the engine's completion plumbing calls back into user code one
//! direction (open, send, recv) at a time.

use std::net::SocketAddr;

use bytes::Bytes;

use sockengine_core::error::EngineResult;

/// Address family a socket is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    /// Let the resolver/host decide based on the resolved address.
    Unspecified,
    /// IPv4.
    Inet,
    /// IPv6.
    Inet6,
}

/// Transport semantics a socket is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Connection-oriented, ordered, reliable byte stream (TCP-like).
    Stream,
    /// Connectionless, unordered, unreliable datagram (UDP-like).
    Datagram,
}

/// Static properties a socket is created with. Immutable for the socket's
/// lifetime — reconnecting to a different family or kind means creating a
/// new socket.
#[derive(Debug, Clone, Copy)]
pub struct SocketProperties {
    /// Address family to resolve/bind/connect against.
    pub family: AddressFamily,
    /// Stream vs. datagram semantics.
    pub kind: SocketKind,
    /// Whether this socket is passive (listens and accepts) rather than
    /// active (connects out).
    pub passive: bool,
}

impl SocketProperties {
    /// A connecting (active) stream socket, family decided by resolution.
    #[must_use]
    pub const fn stream() -> Self {
        Self {
            family: AddressFamily::Unspecified,
            kind: SocketKind::Stream,
            passive: false,
        }
    }

    /// A listening (passive) stream socket, family decided by the bind
    /// address.
    #[must_use]
    pub const fn listener() -> Self {
        Self {
            family: AddressFamily::Unspecified,
            kind: SocketKind::Stream,
            passive: true,
        }
    }

    /// A connectionless datagram socket.
    #[must_use]
    pub const fn datagram() -> Self {
        Self {
            family: AddressFamily::Unspecified,
            kind: SocketKind::Datagram,
            passive: false,
        }
    }
}

/// Callbacks the engine invokes on the caller's behalf.
///
/// Every method is synchronous and must return quickly: it runs on the
/// engine's completion path. Long-running work triggered from a callback
/// (e.g. deciding what to send next) should hand off to the caller's own
/// task rather than block here.
pub trait ClientInterface: Send {
    /// The open sequence finished, successfully or not. On success the
    /// socket is ready for `can_send`/`can_recv`. On failure the socket is
    /// already closed.
    ///
    /// `handle` is a weak reference back to this socket: callbacks have no
    /// other way to re-signal their own send/recv direction (e.g. calling
    /// `can_send` after queuing a reply from inside `end_recv`), so
    /// implementations that need to should stash it. It upgrades to `None`
    /// once the socket has fully dropped.
    fn opened(&mut self, result: EngineResult<()>, handle: crate::socket::SocketHandle<Self>)
    where
        Self: Sized;

    /// The socket has fully closed; no further callbacks will follow.
    fn closed(&mut self);

    /// Called when the engine is ready to submit a send. Return `None` to
    /// quiesce the send direction until the caller calls
    /// [`crate::socket::Socket::can_send`] again; return `Some((data,
    /// dest))` to submit `data` immediately. `dest` is only meaningful for
    /// datagram sockets, which must always supply it; connection-oriented
    /// sockets always pass `None` and the engine ignores the field.
    fn begin_send(&mut self) -> Option<(Bytes, Option<SocketAddr>)>;

    /// A previously returned send buffer has completed.
    fn end_send(&mut self, result: EngineResult<usize>);

    /// Called when the engine is ready to submit a receive. Return `None`
    /// to quiesce the recv direction until
    /// [`crate::socket::Socket::can_recv`] is called again; return
    /// `Some(capacity)` to submit a receive of up to `capacity` bytes.
    fn begin_recv(&mut self) -> Option<usize>;

    /// A previously submitted receive has completed with the given bytes
    /// (empty on orderly peer shutdown) and, for a datagram socket, the
    /// sender's address.
    fn end_recv(&mut self, result: EngineResult<(Bytes, Option<SocketAddr>)>);

    /// Called when a passive socket's accept direction is ready to submit
    /// an accept. Return `None` to decline, which quiesces the accept loop
    /// until [`crate::socket::Socket::can_recv`] is next called; return
    /// `Some(interface)` to supply the child's client interface and submit
    /// an asynchronous accept.
    fn begin_accept(&mut self) -> Option<Self>
    where
        Self: Sized;

    /// A previously submitted accept has completed, producing an already
    /// open child socket. The client owns `child` from this point; the
    /// parent socket does not retain a reference.
    fn end_accept(&mut self, result: EngineResult<crate::socket::Socket<Self>>)
    where
        Self: Sized;
}
