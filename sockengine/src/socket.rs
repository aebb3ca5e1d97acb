//! The socket entity and its open/send/recv/close state machine.
//!
//! Grounded on the original PAL's `pal_socket_open`/`pal_socket_open_by_name`/
//! `pal_socket_open_next_begin`/`pal_socket_close`: a socket holds a resolved
//! address list and a cursor into it, tries candidates in order until one
//! connects, then drives independent send and recv loops until the caller
//! closes it. Where the original threads a single mutable struct through a
//! completion-port callback chain, this keeps the same state machine but
//! expresses the iterate-candidates/drive-directions control flow as plain
//! `async fn`s — Rust's coroutines replace the manual continuation-passing.
//!
//! One state machine covers every socket shape: an active stream connects
//! candidates in order, an active datagram binds to the first candidate,
//! and a passive (listening) socket binds and listens, then runs an accept
//! loop in place of the recv direction (the send direction stays quiesced
//! forever — a listening socket never itself sends). The branch is made
//! once, at open time, on [`crate::client::SocketProperties::kind`]/
//! `passive`.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use sockengine_core::alloc::{IoArena, IoBytes};
use sockengine_core::error::{EngineError, EngineResult};

use crate::client::{ClientInterface, SocketKind, SocketProperties};
use crate::context::{AsyncOperationContext, Signal};
use crate::host::{CompioHost, HostSocket};
use crate::resolver::AddressResolver;

/// A boxed, owned driving future for a spawned child socket — the shape
/// [`Socket::listen`]'s `spawn` callback receives for each accepted
/// connection.
pub type BoxedDrive = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Where a socket is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Constructed, open sequence not yet started.
    Created,
    /// Iterating the candidate address list, trying to connect.
    Connecting,
    /// Connected; send/recv loops are active.
    Open,
    /// `close()` was called; directions are draining.
    Closing,
    /// Fully closed. No further activity occurs.
    Closed,
}

struct Shared<C: ClientInterface> {
    client: Mutex<C>,
    state: Mutex<SocketState>,
    open_ctx: AsyncOperationContext,
    send_ctx: AsyncOperationContext,
    recv_ctx: AsyncOperationContext,
    send_signal: Arc<Signal>,
    recv_signal: Arc<Signal>,
    closing: AtomicBool,
    local: Mutex<Option<SocketAddr>>,
    peer: Mutex<Option<SocketAddr>>,
    // Set once the host connects/accepts. `close_shared` shuts this down
    // directly rather than waiting for the send/recv loops to notice
    // `closing` on their own: a loop blocked inside an in-flight
    // `host.send`/`host.recv` only wakes once the kernel completes that
    // operation, and closing the shared fd is what makes the kernel do
    // that promptly instead of leaving it blocked indefinitely.
    host: Mutex<Option<CompioHost>>,
}

fn close_shared<C: ClientInterface>(shared: &Arc<Shared<C>>) {
    if shared.closing.swap(true, Ordering::AcqRel) {
        return; // already closing
    }
    *shared.state.lock() = SocketState::Closing;
    // Synthetic bump before cancellation, per the close-drain scheme:
    // guarantees is_quiescent() cannot observe a false drained state
    // between this call and the send/recv tasks actually stopping.
    shared.send_ctx.begin_close_drain();
    shared.recv_ctx.begin_close_drain();
    // Wake both directions so a quiesced loop notices `closing` promptly
    // instead of waiting indefinitely for a `can_send`/`can_recv` poke.
    shared.send_signal.notify();
    shared.recv_signal.notify();
    // Interrupt any operation already in flight against the host.
    if let Some(host) = shared.host.lock().as_ref() {
        let _ = host.shutdown();
    }
}

/// A single async socket: an actively-managed connecting/connected socket,
/// a bound datagram socket, a listening socket running its own accept loop,
/// or a handle to a connection handed off by that accept loop.
pub struct Socket<C: ClientInterface> {
    props: SocketProperties,
    shared: Arc<Shared<C>>,
}

/// A weak, cloneable reference back to a [`Socket`], handed to
/// [`ClientInterface::opened`] so a callback can re-signal its own
/// send/recv direction without the client struct holding a strong `Arc`
/// back to itself (which would leak: the client lives inside the socket's
/// own shared state).
pub struct SocketHandle<C: ClientInterface> {
    shared: Weak<Shared<C>>,
}

impl<C: ClientInterface> Clone for SocketHandle<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: ClientInterface + 'static> SocketHandle<C> {
    /// Resume a quiesced send direction, if the socket still exists.
    pub fn can_send(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.send_signal.notify();
        }
    }

    /// Resume a quiesced recv direction, if the socket still exists.
    pub fn can_recv(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.recv_signal.notify();
        }
    }

    /// Begin closing the socket, if it still exists. No-op otherwise.
    pub fn close(&self) {
        if let Some(shared) = self.shared.upgrade() {
            close_shared(&shared);
        }
    }

    /// Current lifecycle state, or `None` if the socket has fully dropped.
    #[must_use]
    pub fn state(&self) -> Option<SocketState> {
        self.shared.upgrade().map(|shared| *shared.state.lock())
    }
}

impl<C: ClientInterface + 'static> Socket<C> {
    /// A weak handle usable from inside a [`ClientInterface`] callback.
    #[must_use]
    pub fn downgrade(&self) -> SocketHandle<C> {
        SocketHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SocketState {
        *self.shared.state.lock()
    }

    /// Cached local address, available once the socket is open.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.shared.local.lock()
    }

    /// Cached peer address, available once the socket is open.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *self.shared.peer.lock()
    }

    /// Resume a quiesced send direction: the next send loop iteration will
    /// call `begin_send` again.
    pub fn can_send(&self) {
        self.shared.send_signal.notify();
    }

    /// Resume a quiesced recv direction: the next recv loop iteration will
    /// call `begin_recv` again.
    pub fn can_recv(&self) {
        self.shared.recv_signal.notify();
    }

    /// Begin closing the socket: both directions are cancelled and drained,
    /// then `client.closed()` fires. Idempotent — calling `close` on an
    /// already-closing or closed socket is a no-op.
    pub fn close(&self) {
        close_shared(&self.shared);
    }

    fn is_closing(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    /// Resolve `host:port` via `resolver`, then connect to candidates in
    /// order until one succeeds, firing `client.opened(..)` exactly once
    /// with the final result. Returns the socket handle and the future that
    /// drives it — the caller is responsible for polling/spawning that
    /// future (e.g. via `compio::runtime::spawn`).
    ///
    /// # Errors
    ///
    /// The returned handle is always produced; failures are reported
    /// through `client.opened(Err(..))` rather than this function's return
    /// value, since the socket's lifecycle is driven by the callback
    /// interface, not by awaiting a single result.
    pub async fn open_by_name<R: AddressResolver>(
        props: SocketProperties,
        host: &str,
        port: u16,
        resolver: &R,
        client: C,
    ) -> (Self, impl std::future::Future<Output = ()>) {
        let addrs = resolver.resolve(host, port).await;
        Self::open_candidates(props, addrs, client)
    }

    /// Connect to candidates in `addrs`, in order, stopping at the first
    /// that succeeds. Mirrors `open_by_name` but skips resolution — the
    /// "open by address" entry point.
    pub fn open_by_addr(
        props: SocketProperties,
        addrs: Vec<SocketAddr>,
        client: C,
    ) -> (Self, impl std::future::Future<Output = ()>) {
        let addrs = if addrs.is_empty() {
            Err(EngineError::NoAddress)
        } else {
            Ok(addrs)
        };
        Self::open_candidates(props, addrs, client)
    }

    fn open_candidates(
        props: SocketProperties,
        addrs: EngineResult<Vec<SocketAddr>>,
        client: C,
    ) -> (Self, impl std::future::Future<Output = ()>) {
        let kind = props.kind;
        let shared = Arc::new(Shared {
            client: Mutex::new(client),
            state: Mutex::new(SocketState::Created),
            open_ctx: AsyncOperationContext::new(),
            send_ctx: AsyncOperationContext::new(),
            recv_ctx: AsyncOperationContext::new(),
            send_signal: Signal::new(),
            recv_signal: Signal::new(),
            closing: AtomicBool::new(false),
            local: Mutex::new(None),
            peer: Mutex::new(None),
            host: Mutex::new(None),
        });
        let socket = Self {
            props,
            shared: shared.clone(),
        };
        let drive = async move { Self::drive(shared, addrs, kind).await };
        (socket, drive)
    }

    /// Bind and listen on `addr`, running an accept loop in place of the
    /// recv direction (the send direction is permanently quiesced — a
    /// listening socket never itself sends). Each accepted connection's
    /// client interface comes from the parent's own
    /// [`ClientInterface::begin_accept`]; `spawn` is responsible for
    /// polling the returned driving future for each accepted child, since
    /// the accept loop must keep accepting while children run.
    ///
    /// Returns the socket handle and the future that drives the accept
    /// loop itself — same contract as `open_by_addr`.
    pub fn listen<S>(props: SocketProperties, addr: SocketAddr, client: C, spawn: S) -> (Self, impl Future<Output = ()>)
    where
        S: Fn(BoxedDrive) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            client: Mutex::new(client),
            state: Mutex::new(SocketState::Created),
            open_ctx: AsyncOperationContext::new(),
            send_ctx: AsyncOperationContext::new(),
            recv_ctx: AsyncOperationContext::new(),
            send_signal: Signal::new(),
            recv_signal: Signal::new(),
            closing: AtomicBool::new(false),
            local: Mutex::new(None),
            peer: Mutex::new(None),
            host: Mutex::new(None),
        });
        let socket = Self {
            props,
            shared: shared.clone(),
        };
        let drive = async move { Self::drive_listen(shared, addr, spawn).await };
        (socket, drive)
    }

    /// Wrap an already-connected host socket (the listener's accept path),
    /// skipping the connect sequence entirely. Returns the socket and its
    /// driving future, same contract as `open_by_name`.
    pub fn from_accepted(
        props: SocketProperties,
        host: CompioHost,
        client: C,
    ) -> (Self, impl std::future::Future<Output = ()>) {
        let local = host.local_addr().ok();
        let peer = host.peer_addr().ok();
        let shared = Arc::new(Shared {
            client: Mutex::new(client),
            state: Mutex::new(SocketState::Open),
            open_ctx: AsyncOperationContext::new(),
            send_ctx: AsyncOperationContext::new(),
            recv_ctx: AsyncOperationContext::new(),
            send_signal: Signal::new(),
            recv_signal: Signal::new(),
            closing: AtomicBool::new(false),
            local: Mutex::new(local),
            peer: Mutex::new(peer),
            host: Mutex::new(Some(host.clone())),
        });
        *shared.local.lock() = local;
        *shared.peer.lock() = peer;
        let socket = Self {
            props,
            shared: shared.clone(),
        };
        let handle = SocketHandle {
            shared: Arc::downgrade(&shared),
        };
        shared.client.lock().opened(Ok(()), handle);
        let drive = async move { Self::drive_open(shared, host).await };
        (socket, drive)
    }

    async fn drive(shared: Arc<Shared<C>>, addrs: EngineResult<Vec<SocketAddr>>, kind: SocketKind) {
        *shared.state.lock() = SocketState::Connecting;
        let addrs = match addrs {
            Ok(addrs) => addrs,
            Err(e) => {
                let handle = SocketHandle {
                    shared: Arc::downgrade(&shared),
                };
                shared.client.lock().opened(Err(e), handle);
                *shared.state.lock() = SocketState::Closed;
                return;
            }
        };

        let _guard = shared.open_ctx.guard();
        let mut aborted = false;
        for addr in &addrs {
            if shared.closing.load(Ordering::Acquire) {
                aborted = true;
                break;
            }
            trace!(%addr, "attempting open");
            let attempt = match kind {
                SocketKind::Stream => CompioHost::connect(*addr).await,
                SocketKind::Datagram => CompioHost::bind_datagram(*addr).await,
            };
            match attempt {
                Ok(host) => {
                    debug!(%addr, "connected");
                    *shared.local.lock() = host.local_addr().ok();
                    *shared.peer.lock() = host.peer_addr().ok();
                    *shared.state.lock() = SocketState::Open;
                    *shared.host.lock() = Some(host.clone());
                    let handle = SocketHandle {
                        shared: Arc::downgrade(&shared),
                    };
                    shared.client.lock().opened(Ok(()), handle);
                    drop(_guard);
                    Self::drive_open(shared, host).await;
                    return;
                }
                Err(e) => {
                    // The per-candidate error only decides whether to advance
                    // to the next address; it is never the error reported on
                    // exhaustion (that is always `Connecting`, below).
                    warn!(%addr, error = %e, "connect attempt failed");
                }
            }
        }

        let final_err = if aborted {
            EngineError::Aborted
        } else {
            EngineError::Connecting
        };
        let handle = SocketHandle {
            shared: Arc::downgrade(&shared),
        };
        shared.client.lock().opened(Err(final_err), handle);
        *shared.state.lock() = SocketState::Closed;
    }

    async fn drive_open(shared: Arc<Shared<C>>, host: CompioHost) {
        // Each direction gets its own clone of the host handle rather than
        // sharing one behind a lock: compio's completion model allows
        // concurrent independent read and write submissions against the
        // same underlying fd, so send_loop and recv_loop never contend.
        let recv_host = host.clone();
        Self::finish_directions(
            &shared,
            Self::send_loop(&shared, host),
            Self::recv_loop(&shared, recv_host),
        )
        .await;
    }

    async fn drive_listen<S>(shared: Arc<Shared<C>>, addr: SocketAddr, spawn: S)
    where
        S: Fn(BoxedDrive) + Send + Sync + 'static,
    {
        *shared.state.lock() = SocketState::Connecting;
        match CompioHost::bind_listen(addr).await {
            Ok(host) => {
                debug!(%addr, "listening");
                *shared.local.lock() = host.local_addr().ok();
                *shared.state.lock() = SocketState::Open;
                *shared.host.lock() = Some(host.clone());
                let handle = SocketHandle {
                    shared: Arc::downgrade(&shared),
                };
                shared.client.lock().opened(Ok(()), handle);
                Self::finish_directions(
                    &shared,
                    Self::noop_send_loop(&shared),
                    Self::accept_loop(&shared, host, spawn),
                )
                .await;
            }
            Err(e) => {
                warn!(%addr, error = %e, "listen failed");
                let handle = SocketHandle {
                    shared: Arc::downgrade(&shared),
                };
                shared
                    .client
                    .lock()
                    .opened(Err(EngineError::Connecting), handle);
                *shared.state.lock() = SocketState::Closed;
            }
        }
    }

    /// Join the send-direction and recv-direction (or accept-direction)
    /// futures, then finalize shared close bookkeeping common to every
    /// socket shape.
    async fn finish_directions(
        shared: &Arc<Shared<C>>,
        send: impl Future<Output = ()>,
        recv: impl Future<Output = ()>,
    ) {
        futures::join!(send, recv);

        // Both directions have drained. Quiesce the synthetic close-drain
        // bumps before checking for full quiescence.
        if shared.closing.load(Ordering::Acquire) {
            shared.send_ctx.end_close_drain();
            shared.recv_ctx.end_close_drain();
        }
        *shared.state.lock() = SocketState::Closed;
        shared.client.lock().closed();
    }

    async fn send_loop(shared: &Arc<Shared<C>>, mut host: CompioHost) {
        loop {
            if shared.closing.load(Ordering::Acquire) {
                let _ = host.shutdown();
                return;
            }
            let next = shared.client.lock().begin_send();
            let Some((data, dest)) = next else {
                shared.send_signal.wait().await;
                continue;
            };
            let guard = shared.send_ctx.guard();
            let (result, _buf) = match dest {
                Some(addr) => host.send_to(IoBytes::new(data), addr).await,
                None => host.send(IoBytes::new(data)).await,
            };
            drop(guard);
            if shared.closing.load(Ordering::Acquire) {
                // Close raced the in-flight send: the completion is treated
                // as cancelled and never reaches the client, per the
                // no-events-after-close invariant.
                let _ = host.shutdown();
                return;
            }
            let result = result.map_err(EngineError::from_os);
            let failed = result.is_err();
            shared.client.lock().end_send(result);
            if failed {
                let _ = host.shutdown();
                return;
            }
        }
    }

    /// The send direction for a passive socket: listening sockets never
    /// themselves send, so this just waits for closing, keeping
    /// `finish_directions`'s join symmetric with the active-socket path.
    async fn noop_send_loop(shared: &Arc<Shared<C>>) {
        loop {
            if shared.closing.load(Ordering::Acquire) {
                return;
            }
            shared.send_signal.wait().await;
        }
    }

    /// The accept direction for a passive socket: pulls a child client
    /// interface via `begin_accept`, submits an accept, and reports the
    /// result via `end_accept`. Declining (`begin_accept` returns `None`)
    /// quiesces on `recv_signal`, resumed by `can_recv`, mirroring the
    /// recv direction's quiesce/resume contract exactly.
    async fn accept_loop<S>(shared: &Arc<Shared<C>>, host: CompioHost, spawn: S)
    where
        S: Fn(BoxedDrive) + Send + Sync + 'static,
    {
        loop {
            if shared.closing.load(Ordering::Acquire) {
                return;
            }
            let child_interface = shared.client.lock().begin_accept();
            let Some(child_interface) = child_interface else {
                shared.recv_signal.wait().await;
                continue;
            };
            let guard = shared.recv_ctx.guard();
            let accepted = host.accept().await;
            drop(guard);
            if shared.closing.load(Ordering::Acquire) {
                // Close raced the in-flight accept: treated as cancelled,
                // same as the send/recv directions.
                return;
            }
            match accepted {
                Ok(child_host) => {
                    debug!(peer = ?child_host.peer_addr().ok(), "accepted connection");
                    let (child, drive) =
                        Socket::from_accepted(SocketProperties::stream(), child_host, child_interface);
                    shared.client.lock().end_accept(Ok(child));
                    spawn(Box::pin(drive));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    shared
                        .client
                        .lock()
                        .end_accept(Err(EngineError::from_os(e)));
                }
            }
        }
    }

    async fn recv_loop(shared: &Arc<Shared<C>>, mut host: CompioHost) {
        let mut arena = IoArena::new();
        let is_datagram = host.is_datagram();
        loop {
            if shared.closing.load(Ordering::Acquire) {
                return;
            }
            let capacity = shared.client.lock().begin_recv();
            let Some(capacity) = capacity else {
                shared.recv_signal.wait().await;
                continue;
            };
            let slab = match arena.alloc_mut(capacity) {
                Ok(slab) => slab,
                Err(e) => {
                    shared.client.lock().end_recv(Err(e));
                    return;
                }
            };
            let guard = shared.recv_ctx.guard();
            let (result, slab) = if is_datagram {
                let (result, slab) = host.recv_from(slab).await;
                (result.map(|(n, from)| (n, Some(from))), slab)
            } else {
                let (result, slab) = host.recv(slab).await;
                (result.map(|n| (n, None)), slab)
            };
            drop(guard);
            if shared.closing.load(Ordering::Acquire) {
                // Close raced the in-flight receive: treated as cancelled,
                // same as the send direction.
                return;
            }
            match result {
                // Zero-length reads only mean orderly shutdown on a stream;
                // an empty datagram is a legitimate message.
                Ok((0, None)) if !is_datagram => {
                    shared.client.lock().end_recv(Ok((bytes::Bytes::new(), None)));
                    return; // orderly peer shutdown
                }
                Ok((_, from)) => {
                    let bytes = slab.freeze();
                    shared.client.lock().end_recv(Ok((bytes, from)));
                }
                Err(e) => {
                    let err = EngineError::from_os(e);
                    shared.client.lock().end_recv(Err(err));
                    return;
                }
            }
        }
    }
}
