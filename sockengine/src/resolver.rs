//! Address resolution: turning a name or address string into the candidate
//! list [`crate::socket::Socket::open_by_name`] iterates while connecting.
//!
//! This engine does not bundle a full DNS resolver — [`CompioResolver`] is a
//! thin convenience adapter over the host runtime's getaddrinfo-equivalent.
//! Callers needing service discovery, caching, or custom resolution policy
//! supply their own [`AddressResolver`].

use std::net::SocketAddr;

use async_trait::async_trait;

use sockengine_core::error::{EngineError, EngineResult};

/// Resolves a host/port pair to an ordered list of candidate addresses.
///
/// Order matters: [`crate::socket::Socket::open_by_name`] tries candidates
/// in the order returned, stopping at the first that connects.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve `host:port` to zero or more candidate addresses.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HostUnknown`] if the name does not exist,
    /// [`EngineError::Retry`] for a transient resolution failure, or
    /// [`EngineError::Fatal`] for a permanent one.
    async fn resolve(&self, host: &str, port: u16) -> EngineResult<Vec<SocketAddr>>;
}

/// Default resolver backed by the host runtime's async name resolution.
pub struct CompioResolver;

impl CompioResolver {
    /// Construct a new resolver. Stateless — safe to share or clone freely.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for CompioResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressResolver for CompioResolver {
    async fn resolve(&self, host: &str, port: u16) -> EngineResult<Vec<SocketAddr>> {
        use compio::net::ToSocketAddrsAsync;

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs_async()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::InvalidInput => {
                    EngineError::HostUnknown(host.to_string())
                }
                _ => EngineError::Retry,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(EngineError::NoHost);
        }
        Ok(addrs)
    }
}

/// Resolve a pre-parsed address list directly, bypassing name resolution.
///
/// Mirrors the engine's "open by address" entry point, which iterates a
/// caller-supplied address list exactly the way `open_by_name` iterates a
/// resolved one.
pub async fn resolve_literal(addrs: Vec<SocketAddr>) -> EngineResult<Vec<SocketAddr>> {
    if addrs.is_empty() {
        return Err(EngineError::NoAddress);
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeResolver(Vec<SocketAddr>);

    #[async_trait]
    impl AddressResolver for FakeResolver {
        async fn resolve(&self, _host: &str, _port: u16) -> EngineResult<Vec<SocketAddr>> {
            if self.0.is_empty() {
                Err(EngineError::NoHost)
            } else {
                Ok(self.0.clone())
            }
        }
    }

    #[compio::test]
    async fn fake_resolver_returns_configured_addresses() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let resolver = FakeResolver(vec![addr]);
        let resolved = resolver.resolve("ignored", 0).await.unwrap();
        assert_eq!(resolved, vec![addr]);
    }

    #[compio::test]
    async fn fake_resolver_errors_on_empty_list() {
        let resolver = FakeResolver(vec![]);
        assert!(matches!(
            resolver.resolve("ignored", 0).await,
            Err(EngineError::NoHost)
        ));
    }

    #[compio::test]
    async fn resolve_literal_rejects_empty_list() {
        assert!(matches!(
            resolve_literal(vec![]).await,
            Err(EngineError::NoAddress)
        ));
    }
}
