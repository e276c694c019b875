// # Memory Cache Store
//
// In-memory implementation of CacheStore. Nothing survives a restart, so the
// first report after a restart always reconciles.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::CacheStore;

/// In-memory cache store
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    inner: Arc<RwLock<Option<IpAddr>>>,
}

impl MemoryCacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with an address
    pub fn with_address(ip: IpAddr) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(ip))),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn read(&self) -> Result<Option<IpAddr>, Error> {
        Ok(*self.inner.read().await)
    }

    async fn write(&self, ip: IpAddr) -> Result<(), Error> {
        *self.inner.write().await = Some(ip);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
