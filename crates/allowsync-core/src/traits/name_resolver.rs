// # Name Resolver Trait
//
// Resolves configured hostnames to the addresses that should be allowed.
//
// ## Implementations
//
// - `SystemResolver`: the OS resolver via `tokio::net::lookup_host`
// - Tests provide static resolvers

use async_trait::async_trait;
use std::net::IpAddr;

use crate::Error;

/// Trait for hostname resolution
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolve a hostname to all of its addresses
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<IpAddr>)`: Addresses in resolver order (may be empty)
    /// - `Err(Error::Resolution)`: The lookup itself failed
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, Error>;
}

/// System DNS resolver using the OS resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NameResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        // Literal addresses resolve to themselves
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        // Port 0 is only there to satisfy lookup_host
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| Error::resolution(format!("Failed to resolve {}: {}", host, e)))?;

        let mut out: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            let ip = addr.ip();
            if !out.contains(&ip) {
                out.push(ip);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_address_resolves_to_itself() {
        let resolver = SystemResolver::new();
        let ips = resolver.resolve("192.0.2.7").await.unwrap();
        assert_eq!(ips, vec![IpAddr::from([192, 0, 2, 7])]);
    }

    #[tokio::test]
    async fn localhost_resolves() {
        let resolver = SystemResolver::new();
        let ips = resolver.resolve("localhost").await.unwrap();
        assert!(!ips.is_empty());
        assert!(ips.iter().all(|ip| ip.is_loopback()));
    }
}
