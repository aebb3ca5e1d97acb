//! # Sockengine
//!
//! **Internal async socket engine implementation.**
//!
//! This crate provides a completion-based (and optionally readiness-based)
//! async socket engine: a single [`Socket`](socket::Socket) entity that
//! drives an open/connect sequence across a resolved address list, then
//! shuttles send/recv operations through a pair of tri-state I/O queues
//! until the caller closes it. It exists to back a remote-socket proxy's
//! platform abstraction layer, not to expose a protocol of its own — there
//! is no framing, handshake, or message format here, only bytes in and
//! bytes out.
//!
//! ## Layering
//!
//! - [`resolver`] — turns names/addresses into a candidate list
//! - [`host`] / [`readiness`] — the two substrate shapes a socket can run
//!   against: completion-port style ([`host::HostSocket`]) or readiness
//!   style ([`readiness::PollSubstrate`])
//! - [`context`] — the async operation context: begin/complete handler
//!   pairs plus the pending counter that gates re-entrancy
//! - [`socket`] — the socket entity and its open/send/recv/close/accept
//!   state machine (passive sockets run their accept loop through the same
//!   machine, not a separate type)
//! - [`client`] — the trait a caller implements to receive engine events

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::future_not_send)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod context;
pub mod host;
pub mod readiness;
pub mod resolver;
pub mod socket;

pub use client::{ClientInterface, SocketProperties};
pub use host::{CompioHost, HostSocket};
pub use readiness::PollSubstrate;
pub use resolver::{AddressResolver, CompioResolver};
pub use socket::{Socket, SocketHandle};

/// Prelude module for convenient imports.
///
/// ```rust
/// use sockengine::prelude::*;
/// ```
pub mod prelude {
    pub use super::client::{ClientInterface, SocketProperties};
    pub use super::host::{CompioHost, HostSocket};
    pub use super::readiness::PollSubstrate;
    pub use super::resolver::{AddressResolver, CompioResolver};
    pub use super::socket::{Socket, SocketHandle};
    pub use bytes::Bytes;
}
