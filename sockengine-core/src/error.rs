//! Sockengine error taxonomy.
//!
//! Mirrors the result codes a completion-based socket PAL returns to its
//! caller. `ok` has no variant here: success is `Result::Ok` the way every
//! other Rust API expresses it. `waiting` is not part of this enum either —
//! it is a transient suspension signal internal to the engine's begin/
//! complete plumbing (see `sockengine::context`), never an error a caller
//! observes.

use std::io;
use thiserror::Error;

/// Errors an engine operation can fail with.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unspecified internal failure.
    #[error("operation faulted")]
    Fault,

    /// Allocation failure (arena or OS exhausted).
    #[error("out of memory")]
    OutOfMemory,

    /// The requested operation is not supported for this socket type.
    #[error("operation not supported")]
    NotSupported,

    /// An argument failed validation.
    #[error("invalid argument: {0}")]
    Arg(String),

    /// The socket is closed or closing.
    #[error("socket closed")]
    Closed,

    /// The socket is still completing its open sequence.
    #[error("connect in progress")]
    Connecting,

    /// The operation was aborted (cancelled mid-flight, e.g. by close()).
    #[error("operation aborted")]
    Aborted,

    /// A name could not be resolved to any address.
    #[error("host unknown: {0}")]
    HostUnknown(String),

    /// Resolution failed transiently; the caller should retry.
    #[error("resolution should be retried")]
    Retry,

    /// Resolution failed permanently.
    #[error("fatal resolver error: {0}")]
    Fatal(String),

    /// The resolver returned no host records at all.
    #[error("no host records returned")]
    NoHost,

    /// The resolver returned host records but none usable (e.g. wrong family).
    #[error("no usable address in host records")]
    NoAddress,

    /// Flags supplied to an operation are invalid or mutually exclusive.
    #[error("bad flags")]
    BadFlags,

    /// The requested address family is not supported by the host or socket.
    #[error("unsupported address family")]
    AddressFamily,

    /// Propagated OS-level I/O failure, translated from `std::io::Error`.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result type alias for sockengine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Translate a raw OS error into the engine's taxonomy.
    ///
    /// Connection-refused/reset/aborted map to [`EngineError::Aborted`] since
    /// they represent a peer-initiated termination rather than an internal
    /// fault; everything else passes through as [`EngineError::Io`].
    #[must_use]
    pub fn from_os(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Self::Aborted,
            io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Io(err),
        }
    }

    /// Whether this error represents a closed or closing socket.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_os_maps_connection_refused_to_aborted() {
        let err = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(EngineError::from_os(err), EngineError::Aborted));
    }

    #[test]
    fn from_os_passes_through_other_errors() {
        let err = io::Error::from(io::ErrorKind::InvalidInput);
        assert!(matches!(EngineError::from_os(err), EngineError::Io(_)));
    }

    #[test]
    fn is_closed_only_matches_closed_variant() {
        assert!(EngineError::Closed.is_closed());
        assert!(!EngineError::Fault.is_closed());
    }
}
