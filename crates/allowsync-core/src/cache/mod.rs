//! Idempotency cache (server mode only)
//!
//! Keeps the last address for which a reconciliation reported success, so a
//! client that keeps reporting the same address costs no remote calls.
//!
//! The in-memory value is only ever set after a remote success. Durable
//! persistence is best effort: a failed write is logged and swallowed, since
//! the remote change already took effect.

pub mod file;
pub mod memory;

pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

use std::net::IpAddr;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::traits::CacheStore;

/// Build the configured cache store
pub fn store_from_config(config: &CacheConfig) -> Box<dyn CacheStore> {
    match config {
        CacheConfig::File { path } => Box::new(FileCacheStore::new(path)),
        CacheConfig::Memory => Box::new(MemoryCacheStore::new()),
    }
}

/// In-memory gate value backed by a durable store
pub struct IdempotencyCache {
    store: Box<dyn CacheStore>,
    current: RwLock<Option<IpAddr>>,
}

impl IdempotencyCache {
    /// Create an empty cache over `store`
    ///
    /// Call [`IdempotencyCache::load`] once at startup to seed it.
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// Seed the in-memory value from the durable store
    ///
    /// Unreadable or corrupt storage is not fatal: it is logged and treated
    /// as "nothing cached", which forces the next report to reconcile.
    pub async fn load(&self) -> Option<IpAddr> {
        let loaded = match self.store.read().await {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring cached address at {}: {}", self.store.location(), e);
                None
            }
        };

        *self.current.write().await = loaded;
        match loaded {
            Some(ip) => info!("Cached address: {}", ip),
            None => info!("No cached address at {}", self.store.location()),
        }
        loaded
    }

    /// True if `candidate` equals the last successfully applied address
    pub async fn check(&self, candidate: IpAddr) -> bool {
        *self.current.read().await == Some(candidate)
    }

    /// Record a successfully applied address
    ///
    /// Must only be called after the remote reconciliation succeeded.
    pub async fn store(&self, ip: IpAddr) {
        *self.current.write().await = Some(ip);

        match self.store.write(ip).await {
            Ok(()) => debug!("Cached address {} at {}", ip, self.store.location()),
            Err(e) => warn!("Failed to persist cached address {}: {}", ip, e),
        }
    }

    /// Current in-memory value
    pub async fn cached(&self) -> Option<IpAddr> {
        *self.current.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// A store whose reads and writes always fail
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn read(&self) -> crate::Result<Option<IpAddr>> {
            Err(crate::Error::persistence("disk on fire"))
        }

        async fn write(&self, _ip: IpAddr) -> crate::Result<()> {
            Err(crate::Error::persistence("disk on fire"))
        }

        fn location(&self) -> String {
            "broken".to_string()
        }
    }

    #[tokio::test]
    async fn load_seeds_from_store() {
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        let cache = IdempotencyCache::new(Box::new(MemoryCacheStore::with_address(ip)));

        assert!(!cache.check(ip).await, "nothing is cached before load");
        assert_eq!(cache.load().await, Some(ip));
        assert!(cache.check(ip).await);
        assert!(!cache.check("9.9.9.9".parse().unwrap()).await);
    }

    #[tokio::test]
    async fn unreadable_store_loads_as_empty() {
        let cache = IdempotencyCache::new(Box::new(BrokenStore));
        assert_eq!(cache.load().await, None);
    }

    #[tokio::test]
    async fn failed_persist_still_updates_memory() {
        let cache = IdempotencyCache::new(Box::new(BrokenStore));
        let ip: IpAddr = "5.6.7.8".parse().unwrap();

        cache.store(ip).await;

        assert!(cache.check(ip).await);
        assert_eq!(cache.cached().await, Some(ip));
    }

    #[tokio::test]
    async fn stored_value_survives_restart() {
        let dir = tempdir().unwrap();
        let config = CacheConfig::File {
            path: dir.path().join("ip_cache"),
        };
        let ip: IpAddr = "9.9.9.9".parse().unwrap();

        let cache = IdempotencyCache::new(store_from_config(&config));
        cache.load().await;
        cache.store(ip).await;

        let restarted = IdempotencyCache::new(store_from_config(&config));
        assert_eq!(restarted.load().await, Some(ip));
    }
}
