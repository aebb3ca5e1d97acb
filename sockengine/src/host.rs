//! The host networking collaborator: the completion-style substrate the
//! engine drives I/O through.
//!
//! [`HostSocket`] abstracts over "a socket that accepts owned buffers and
//! hands them back on completion" — the shape `compio`'s io_uring-backed
//! primitives naturally have, and the shape the engine's
//! [`crate::context::AsyncOperationContext`] submits against. [`CompioHost`]
//! is the default implementation, covering the three socket shapes the
//! engine drives: a connected stream, a bound datagram socket, and a
//! listening socket. A test double backing the end-to-end scenarios lives
//! alongside `socket.rs`'s tests.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::{TcpListener, TcpStream, UdpSocket};

use sockengine_core::alloc::{IoBytes, SlabMut};
use sockengine_core::tcp::enable_tcp_nodelay;

fn unsupported(op: &'static str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{op} not supported for this host kind"),
    )
}

/// A socket primitive the engine can drive a completion-style I/O loop
/// against.
///
/// Every buffer-carrying method takes ownership of its buffer and hands it
/// back regardless of success or failure, matching `compio`'s `BufResult`
/// convention — the buffer's memory must remain valid for the duration of
/// the (possibly kernel-side) operation, so it cannot be borrowed.
#[async_trait]
pub trait HostSocket: Send {
    /// Submit `buf`'s initialized bytes for sending on a connected socket.
    /// Returns the number of bytes actually sent and the buffer back.
    async fn send(&mut self, buf: IoBytes) -> (io::Result<usize>, IoBytes);

    /// Submit `buf` to receive into on a connected socket. Returns the
    /// number of bytes read (zero on orderly peer shutdown) and the buffer
    /// back, now containing the received bytes.
    async fn recv(&mut self, buf: SlabMut) -> (io::Result<usize>, SlabMut);

    /// Submit `buf` for sending to `addr` on a connectionless socket.
    async fn send_to(&mut self, buf: IoBytes, addr: SocketAddr) -> (io::Result<usize>, IoBytes);

    /// Submit `buf` to receive a single datagram into, returning the sender
    /// address alongside the byte count.
    async fn recv_from(&mut self, buf: SlabMut) -> (io::Result<(usize, SocketAddr)>, SlabMut);

    /// The locally bound address, cached at connect/bind/accept time.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// The remote peer's address, cached at connect/accept time. Not
    /// meaningful for datagram or listening hosts.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Shut down the host's I/O, unblocking anything in flight against it.
    /// Idempotent.
    fn shutdown(&self) -> io::Result<()>;
}

/// `compio`-backed [`HostSocket`], covering the three shapes a socket
/// entity can be opened as: a connected stream, a bound datagram socket, or
/// a listening socket accepting incoming streams.
///
/// Cheap to clone: `compio`'s `TcpStream` shares the underlying file
/// descriptor across clones, and io_uring allows independent concurrent
/// read and write submissions against the same fd. The datagram and
/// listener variants wrap their socket in an `Arc` for the same cheap-clone
/// property. `Socket`'s send/recv (or accept) loops each hold their own
/// clone rather than sharing one behind a lock, so neither direction ever
/// blocks the other.
#[derive(Clone)]
pub enum CompioHost {
    /// A connected, ordered byte-stream socket.
    Stream {
        stream: Arc<TcpStream>,
        local: SocketAddr,
        peer: SocketAddr,
    },
    /// A bound, connectionless datagram socket.
    Datagram {
        socket: Arc<UdpSocket>,
        local: SocketAddr,
    },
    /// A bound, listening socket accepting incoming streams.
    Listener {
        listener: Arc<TcpListener>,
        local: SocketAddr,
    },
}

impl CompioHost {
    /// Connect to `addr`, enabling `TCP_NODELAY` and caching the local and
    /// peer addresses the way the socket entity's open-complete handler
    /// does for every successful connect.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream)
    }

    /// Wrap an already-connected stream (used by the accept path, where the
    /// stream is already established).
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        enable_tcp_nodelay(&stream)?;
        let local = stream.local_addr()?;
        let peer = stream.peer_addr()?;
        Ok(Self::Stream {
            stream: Arc::new(stream),
            local,
            peer,
        })
    }

    /// Bind a datagram socket to `addr`.
    pub async fn bind_datagram(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local = socket.local_addr()?;
        Ok(Self::Datagram {
            socket: Arc::new(socket),
            local,
        })
    }

    /// Bind and begin listening on `addr`.
    pub async fn bind_listen(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        Ok(Self::Listener {
            listener: Arc::new(listener),
            local,
        })
    }

    /// Whether this host is a datagram socket — the accept/recv loops use
    /// this to decide between the plain and `_from`/`_to` operation pairs.
    #[must_use]
    pub fn is_datagram(&self) -> bool {
        matches!(self, Self::Datagram { .. })
    }

    /// Accept a single incoming connection. Only valid on a `Listener` host.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::Unsupported`] on a non-listener host, or
    /// whatever `accept()` itself fails with.
    pub async fn accept(&self) -> io::Result<Self> {
        match self {
            Self::Listener { listener, .. } => {
                let (stream, _peer) = listener.accept().await?;
                Self::from_stream(stream)
            }
            Self::Stream { .. } | Self::Datagram { .. } => Err(unsupported("accept")),
        }
    }
}

#[async_trait]
impl HostSocket for CompioHost {
    async fn send(&mut self, buf: IoBytes) -> (io::Result<usize>, IoBytes) {
        match self {
            Self::Stream { stream, .. } => {
                let mut stream = stream.as_ref();
                let result = stream.write(buf).await;
                (result.0, result.1)
            }
            Self::Datagram { .. } | Self::Listener { .. } => (Err(unsupported("send")), buf),
        }
    }

    async fn recv(&mut self, buf: SlabMut) -> (io::Result<usize>, SlabMut) {
        match self {
            Self::Stream { stream, .. } => {
                let mut stream = stream.as_ref();
                let result = stream.read(buf).await;
                (result.0, result.1)
            }
            Self::Datagram { .. } | Self::Listener { .. } => (Err(unsupported("recv")), buf),
        }
    }

    async fn send_to(&mut self, buf: IoBytes, addr: SocketAddr) -> (io::Result<usize>, IoBytes) {
        match self {
            Self::Datagram { socket, .. } => {
                let result = socket.send_to(buf, addr).await;
                (result.0, result.1)
            }
            Self::Stream { .. } | Self::Listener { .. } => (Err(unsupported("send_to")), buf),
        }
    }

    async fn recv_from(&mut self, buf: SlabMut) -> (io::Result<(usize, SocketAddr)>, SlabMut) {
        match self {
            Self::Datagram { socket, .. } => {
                let result = socket.recv_from(buf).await;
                (result.0, result.1)
            }
            Self::Stream { .. } | Self::Listener { .. } => (Err(unsupported("recv_from")), buf),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Stream { local, .. } | Self::Datagram { local, .. } | Self::Listener { local, .. } => Ok(*local),
        }
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Stream { peer, .. } => Ok(*peer),
            Self::Datagram { .. } | Self::Listener { .. } => Err(unsupported("peer_addr")),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match self {
            Self::Stream { stream, .. } => sockengine_core::tcp::shutdown_both(stream),
            // Neither an unconnected datagram socket nor a listening socket
            // has a `shutdown(2)` equivalent that unblocks an in-flight
            // operation; closing these promptly relies on the loop's own
            // `closing` check rather than kernel-side cancellation.
            Self::Datagram { .. } | Self::Listener { .. } => Ok(()),
        }
    }
}
