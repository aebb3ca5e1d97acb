//! Echo client: connects to the echo server, sends a handful of lines, and
//! prints back whatever comes over the wire.
//!
//! Run `cargo run --example echo_server` first, then this in another
//! terminal.

use std::collections::VecDeque;
use std::net::SocketAddr;

use bytes::Bytes;
use sockengine::client::{ClientInterface, SocketProperties};
use sockengine::socket::Socket;
use sockengine_core::error::EngineResult;

struct EchoClient {
    outgoing: VecDeque<Bytes>,
    replies_expected: usize,
}

impl ClientInterface for EchoClient {
    fn opened(&mut self, result: EngineResult<()>, _handle: sockengine::socket::SocketHandle<Self>) {
        match result {
            Ok(()) => println!("connected"),
            Err(e) => eprintln!("failed to connect: {e}"),
        }
    }

    fn closed(&mut self) {
        println!("connection closed");
    }

    fn begin_send(&mut self) -> Option<(Bytes, Option<SocketAddr>)> {
        self.outgoing.pop_front().map(|b| (b, None))
    }

    fn end_send(&mut self, result: EngineResult<usize>) {
        if let Err(e) = result {
            eprintln!("send failed: {e}");
        }
    }

    fn begin_recv(&mut self) -> Option<usize> {
        if self.replies_expected == 0 {
            None
        } else {
            Some(4096)
        }
    }

    fn end_recv(&mut self, result: EngineResult<(Bytes, Option<SocketAddr>)>) {
        match result {
            Ok((data, _)) if !data.is_empty() => {
                println!("echoed back: {}", String::from_utf8_lossy(&data));
                self.replies_expected -= 1;
            }
            Ok(_) => self.replies_expected = 0, // peer closed early
            Err(e) => eprintln!("recv failed: {e}"),
        }
    }

    fn begin_accept(&mut self) -> Option<Self>
    where
        Self: Sized,
    {
        // Active (connecting) sockets never accept.
        None
    }

    fn end_accept(&mut self, _result: EngineResult<Socket<Self>>)
    where
        Self: Sized,
    {
    }
}

#[compio::main]
async fn main() -> std::io::Result<()> {
    sockengine_demo::dev_tracing::init_tracing();

    let lines = ["hello", "from", "sockengine"];
    let client = EchoClient {
        outgoing: lines.iter().map(|s| Bytes::from_static(s.as_bytes())).collect(),
        replies_expected: lines.len(),
    };

    let addr: SocketAddr = "127.0.0.1:7878".parse().unwrap();
    let (socket, drive) = Socket::open_by_addr(SocketProperties::stream(), vec![addr], client);
    compio::runtime::spawn(drive);

    // Wake the send direction once: begin_send already has data queued, so
    // the loop will drain it without needing a can_send() poke here, but
    // replies arrive asynchronously and the recv loop needs the same nudge
    // pattern a caller would use after enqueueing fresh work.
    socket.can_send();
    socket.can_recv();

    compio::time::sleep(std::time::Duration::from_millis(500)).await;
    socket.close();
    Ok(())
}
