//! # Sockengine
//!
//! A completion-style async socket engine and tri-state I/O queue, built on
//! `io_uring`.
//!
//! ## Architecture
//!
//! Sockengine is structured with clean layering:
//!
//! - **`sockengine-core`**: zero-copy slab allocator, error taxonomy, and
//!   the tri-state (ready/in-progress/done) I/O queue
//! - **`sockengine`**: the socket entity, its open/send/recv/close state
//!   machine, and the host/resolver/client-interface traits it is driven
//!   through
//! - **`sockengine-demo`** (this crate): runnable examples over the engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use sockengine::client::{ClientInterface, SocketProperties};
//! use sockengine::resolver::CompioResolver;
//! use sockengine::socket::Socket;
//! use sockengine_core::error::EngineResult;
//! use bytes::Bytes;
//!
//! struct Echo;
//!
//! impl ClientInterface for Echo {
//!     fn opened(&mut self, _result: EngineResult<()>, _handle: sockengine::SocketHandle<Self>) {}
//!     fn closed(&mut self) {}
//!     fn begin_send(&mut self) -> Option<(Bytes, Option<SocketAddr>)> { None }
//!     fn end_send(&mut self, _result: EngineResult<usize>) {}
//!     fn begin_recv(&mut self) -> Option<usize> { Some(4096) }
//!     fn end_recv(&mut self, _result: EngineResult<(Bytes, Option<SocketAddr>)>) {}
//!     fn begin_accept(&mut self) -> Option<Self> where Self: Sized { None }
//!     fn end_accept(&mut self, _result: EngineResult<Socket<Self>>) where Self: Sized {}
//! }
//!
//! # async fn example() {
//! let resolver = CompioResolver::new();
//! let (_socket, drive) =
//!     Socket::open_by_name(SocketProperties::stream(), "example.com", 80, &resolver, Echo).await;
//! drive.await;
//! # }
//! ```
//!
//! ## Performance
//!
//! - **Zero-copy**: uses `bytes::Bytes` for refcounted message buffers
//! - **`io_uring`**: native Linux completion-based async I/O (via `compio`)
//! - **Pluggable substrate**: the completion path above, or the
//!   readiness-style [`sockengine::readiness::PollSubstrate`] for engines
//!   that need to poll rather than submit
//!
//! ## Safety
//!
//! - `unsafe` code is isolated to `sockengine-core`'s allocator; every other
//!   module is `#![deny(unsafe_code)]`

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow some pedantic patterns
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::future_not_send)] // Runtime-agnostic design
#![allow(clippy::missing_errors_doc)] // Will add gradually
#![allow(clippy::doc_markdown)] // Too many false positives

// Re-export the engine's public surface for convenience.
pub use bytes::Bytes;
pub use sockengine::client::{AddressFamily, ClientInterface, SocketKind, SocketProperties};
pub use sockengine::resolver::{AddressResolver, CompioResolver};
pub use sockengine::socket::{Socket, SocketHandle, SocketState};
pub use sockengine_core::error::{EngineError, EngineResult};
pub use sockengine_core::options::QueueOptions;

/// Development helpers (benches/tests)
pub mod dev_tracing;
