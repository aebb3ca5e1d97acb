//! End-to-end scenarios over real loopback sockets: connect fallback across
//! a candidate list, datagram send/recv with peer addressing, passive-socket
//! accept decline/quiesce/resume, and the close-before-any-I/O invariant.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use sockengine::client::{ClientInterface, SocketProperties};
use sockengine::socket::{Socket, SocketHandle, SocketState};
use sockengine_core::error::EngineResult;

#[derive(Default)]
struct Log {
    opened: Vec<bool>,
    closed: usize,
    sent: Vec<usize>,
    received: Vec<Bytes>,
}

struct Recorder {
    log: Arc<Mutex<Log>>,
    to_send: Vec<(Bytes, Option<SocketAddr>)>,
    recv_budget: usize,
}

impl ClientInterface for Recorder {
    fn opened(&mut self, result: EngineResult<()>, _handle: SocketHandle<Self>) {
        self.log.lock().unwrap().opened.push(result.is_ok());
    }

    fn closed(&mut self) {
        self.log.lock().unwrap().closed += 1;
    }

    fn begin_send(&mut self) -> Option<(Bytes, Option<SocketAddr>)> {
        self.to_send.pop()
    }

    fn end_send(&mut self, result: EngineResult<usize>) {
        if let Ok(n) = result {
            self.log.lock().unwrap().sent.push(n);
        }
    }

    fn begin_recv(&mut self) -> Option<usize> {
        if self.recv_budget == 0 {
            None
        } else {
            self.recv_budget -= 1;
            Some(4096)
        }
    }

    fn end_recv(&mut self, result: EngineResult<(Bytes, Option<SocketAddr>)>) {
        if let Ok((b, _from)) = result {
            if !b.is_empty() {
                self.log.lock().unwrap().received.push(b);
            }
        }
    }

    fn begin_accept(&mut self) -> Option<Self>
    where
        Self: Sized,
    {
        None
    }

    fn end_accept(&mut self, _result: EngineResult<Socket<Self>>)
    where
        Self: Sized,
    {
    }
}

/// Poll `pred` with short sleeps until it's true or `attempts` are
/// exhausted, since the drive future runs concurrently in its own spawned
/// task rather than being directly awaitable alongside the test body.
async fn wait_until(attempts: u32, mut pred: impl FnMut() -> bool) {
    for _ in 0..attempts {
        if pred() {
            return;
        }
        compio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(pred(), "condition never became true");
}

/// Scenario S1: a candidate list where the first address refuses the
/// connection synchronously and the second succeeds. `opened(ok)` must fire
/// exactly once, with local/peer addresses populated.
#[compio::test]
async fn connect_falls_back_to_second_candidate_on_refusal() {
    let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let good_addr = listener.local_addr().unwrap();
    compio::runtime::spawn(async move {
        let _ = listener.accept().await;
    })
    .detach();

    // Port 1 on loopback is reserved and refuses connections immediately on
    // every platform this engine targets.
    let bad_addr: SocketAddr = "127.0.0.1:1".parse().unwrap();

    let log = Arc::new(Mutex::new(Log::default()));
    let client = Recorder {
        log: log.clone(),
        to_send: Vec::new(),
        recv_budget: 0,
    };
    let (socket, drive) = Socket::open_by_addr(
        SocketProperties::stream(),
        vec![bad_addr, good_addr],
        client,
    );
    compio::runtime::spawn(drive).detach();

    wait_until(50, || !log.lock().unwrap().opened.is_empty()).await;
    assert_eq!(log.lock().unwrap().opened, vec![true]);
    assert!(socket.local_addr().is_some());
    assert!(socket.peer_addr().is_some());

    socket.close();
    wait_until(50, || log.lock().unwrap().closed == 1).await;
}

/// Scenario S2: two datagram sockets exchange a single message. The
/// receiver observes the sender's address on `end_recv`, and the sender
/// supplies the destination per-send via `begin_send`.
#[compio::test]
async fn datagram_socket_sends_and_receives_with_peer_address() {
    let log_a = Arc::new(Mutex::new(Log::default()));
    let log_b = Arc::new(Mutex::new(Log::default()));

    let (socket_a, drive_a) = Socket::open_by_addr(
        SocketProperties::datagram(),
        vec!["127.0.0.1:0".parse().unwrap()],
        Recorder {
            log: log_a.clone(),
            to_send: Vec::new(),
            recv_budget: 1,
        },
    );
    compio::runtime::spawn(drive_a).detach();
    wait_until(50, || socket_a.local_addr().is_some()).await;
    let addr_a = socket_a.local_addr().unwrap();

    let (socket_b, drive_b) = Socket::open_by_addr(
        SocketProperties::datagram(),
        vec!["127.0.0.1:0".parse().unwrap()],
        Recorder {
            log: log_b.clone(),
            to_send: vec![(Bytes::from_static(b"ping"), Some(addr_a))],
            recv_budget: 0,
        },
    );
    compio::runtime::spawn(drive_b).detach();
    wait_until(50, || socket_b.local_addr().is_some()).await;

    socket_a.can_recv();
    socket_b.can_send();
    wait_until(50, || !log_a.lock().unwrap().received.is_empty()).await;

    assert_eq!(log_a.lock().unwrap().received, vec![Bytes::from_static(b"ping")]);

    socket_a.close();
    socket_b.close();
}

/// Scenario S4 / invariant #6: closing while a send is genuinely in flight
/// must not deliver that send's completion to the client. The peer accepts
/// but never reads, so a large enough payload blocks inside the host's
/// write until `close` shuts the connection down out from under it.
#[compio::test]
async fn close_while_send_blocked_suppresses_its_completion() {
    let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    compio::runtime::spawn(async move {
        // Accept and hold the connection open without ever reading from it,
        // so the peer's receive window fills and the client's write blocks.
        let (_stream, _peer) = listener.accept().await.unwrap();
        compio::time::sleep(std::time::Duration::from_secs(5)).await;
    })
    .detach();

    let log = Arc::new(Mutex::new(Log::default()));
    let oversized = Bytes::from(vec![0u8; 16 * 1024 * 1024]);
    let client = Recorder {
        log: log.clone(),
        to_send: vec![(oversized, None)],
        recv_budget: 0,
    };
    let (socket, drive) = Socket::open_by_addr(SocketProperties::stream(), vec![addr], client);
    compio::runtime::spawn(drive).detach();

    wait_until(50, || !log.lock().unwrap().opened.is_empty()).await;
    // Give the send loop a moment to issue the write and genuinely block on
    // it before closing out from under it.
    compio::time::sleep(std::time::Duration::from_millis(50)).await;
    socket.close();
    wait_until(100, || log.lock().unwrap().closed == 1).await;

    assert_eq!(socket.state(), SocketState::Closed);
    let log = log.lock().unwrap();
    assert_eq!(log.closed, 1);
    assert!(log.sent.is_empty(), "a cancelled send must never reach end_send");
}

/// A listener's `ClientInterface` also types every connection it accepts
/// (`begin_accept`/`end_accept` are parameterized over `Self`), so the
/// accept-gating owner doubles as each accepted child's (inert) interface.
struct AcceptOwner {
    limit: Arc<AtomicUsize>,
    accepted: Arc<AtomicUsize>,
    declines: Arc<AtomicUsize>,
}

impl ClientInterface for AcceptOwner {
    fn opened(&mut self, _result: EngineResult<()>, _handle: SocketHandle<Self>) {}
    fn closed(&mut self) {}
    fn begin_send(&mut self) -> Option<(Bytes, Option<SocketAddr>)> {
        None
    }
    fn end_send(&mut self, _result: EngineResult<usize>) {}
    fn begin_recv(&mut self) -> Option<usize> {
        None
    }
    fn end_recv(&mut self, _result: EngineResult<(Bytes, Option<SocketAddr>)>) {}

    fn begin_accept(&mut self) -> Option<Self>
    where
        Self: Sized,
    {
        if self.accepted.load(Ordering::SeqCst) < self.limit.load(Ordering::SeqCst) {
            Some(AcceptOwner {
                limit: self.limit.clone(),
                accepted: self.accepted.clone(),
                declines: self.declines.clone(),
            })
        } else {
            self.declines.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn end_accept(&mut self, result: EngineResult<Socket<Self>>)
    where
        Self: Sized,
    {
        if result.is_ok() {
            self.accepted.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Scenario S3 (accept decline/quiesce/resume): once the owner's accept
/// budget is exhausted, `begin_accept` declines and the accept loop
/// quiesces — no further `host.accept()` is submitted — until `can_recv`
/// raises the budget and wakes it back up.
#[compio::test]
async fn accept_loop_declines_then_resumes_on_can_recv() {
    let limit = Arc::new(AtomicUsize::new(1));
    let accepted = Arc::new(AtomicUsize::new(0));
    let declines = Arc::new(AtomicUsize::new(0));
    let owner = AcceptOwner {
        limit: limit.clone(),
        accepted: accepted.clone(),
        declines: declines.clone(),
    };

    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let (socket, drive) = Socket::listen(SocketProperties::listener(), addr, owner, |fut| {
        compio::runtime::spawn(fut).detach();
    });
    compio::runtime::spawn(drive).detach();

    wait_until(50, || socket.local_addr().is_some()).await;
    let bound = socket.local_addr().unwrap();

    let _first = compio::net::TcpStream::connect(bound).await.unwrap();
    wait_until(50, || accepted.load(Ordering::SeqCst) == 1).await;

    // The loop immediately re-checks begin_accept after finishing the first
    // accept, finds the budget exhausted, and parks on recv_signal without
    // ever calling host.accept() again.
    wait_until(50, || declines.load(Ordering::SeqCst) >= 1).await;
    compio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1, "declined accept must not be submitted");

    limit.store(2, Ordering::SeqCst);
    socket.can_recv();

    let _second = compio::net::TcpStream::connect(bound).await.unwrap();
    wait_until(50, || accepted.load(Ordering::SeqCst) == 2).await;

    socket.close();
}
