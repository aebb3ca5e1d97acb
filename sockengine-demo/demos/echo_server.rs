//! Echo server: binds a listener and echoes back whatever each connection
//! sends, using the accept loop's per-connection `ClientInterface`.
//!
//! Run with `cargo run --example echo_server`, then in another terminal
//! `cargo run --example echo_client`.
//!
//! The listener and every connection it accepts share one `ClientInterface`
//! type — `begin_accept`/`end_accept` are parameterized over `Self`, so the
//! parent's interface and each child's interface must be the same type. The
//! listener's own instance never sends or receives; only its `begin_accept`
//! is ever called.

use std::collections::VecDeque;
use std::net::SocketAddr;

use bytes::Bytes;
use sockengine::client::{ClientInterface, SocketProperties};
use sockengine::socket::{Socket, SocketHandle};
use sockengine_core::error::EngineResult;

struct EchoConnection {
    pending: VecDeque<Bytes>,
    handle: Option<SocketHandle<Self>>,
}

impl EchoConnection {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            handle: None,
        }
    }
}

impl ClientInterface for EchoConnection {
    fn opened(&mut self, result: EngineResult<()>, handle: SocketHandle<Self>) {
        if let Err(e) = result {
            eprintln!("failed to open: {e}");
        }
        self.handle = Some(handle);
    }

    fn closed(&mut self) {
        println!("connection closed");
    }

    fn begin_send(&mut self) -> Option<(Bytes, Option<SocketAddr>)> {
        self.pending.pop_front().map(|b| (b, None))
    }

    fn end_send(&mut self, result: EngineResult<usize>) {
        if let Err(e) = result {
            eprintln!("send failed: {e}");
        }
    }

    fn begin_recv(&mut self) -> Option<usize> {
        Some(64 * 1024)
    }

    fn end_recv(&mut self, result: EngineResult<(Bytes, Option<SocketAddr>)>) {
        match result {
            Ok((data, _)) if !data.is_empty() => {
                self.pending.push_back(data);
                if let Some(handle) = &self.handle {
                    handle.can_send();
                }
            }
            Ok(_) => {} // orderly peer shutdown
            Err(e) => eprintln!("recv failed: {e}"),
        }
    }

    fn begin_accept(&mut self) -> Option<Self>
    where
        Self: Sized,
    {
        // Called only on the listener's own instance; freshly accepted
        // connections never themselves listen.
        Some(EchoConnection::new())
    }

    fn end_accept(&mut self, result: EngineResult<Socket<Self>>)
    where
        Self: Sized,
    {
        match result {
            Ok(_child) => println!("accepted connection"),
            Err(e) => eprintln!("accept failed: {e}"),
        }
    }
}

#[compio::main]
async fn main() -> std::io::Result<()> {
    sockengine_demo::dev_tracing::init_tracing();

    let addr: SocketAddr = "127.0.0.1:7878".parse().unwrap();
    let (socket, drive) = Socket::listen(SocketProperties::listener(), addr, EchoConnection::new(), |fut| {
        compio::runtime::spawn(fut).detach();
    });
    println!("echoing on {addr}");

    socket.can_recv();
    drive.await;
    Ok(())
}
