// # Cache Store Trait
//
// Durable backend for the idempotency cache.
//
// ## Purpose
//
// Holds the single address most recently applied with success, so a restarted
// server does not re-apply the address its client keeps reporting.
//
// ## Implementations
//
// - File-based: plain text file (default `<temp_dir>/ip_cache`)
// - In-memory: nothing survives a restart

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for cache store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform local I/O for its single value
///
/// ## Forbidden Capabilities
/// - ❌ Decide whether a reconciliation is needed (owned by `IdempotencyCache`)
/// - ❌ Spawn background tasks
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the stored address
    ///
    /// # Returns
    ///
    /// - `Ok(Some(IpAddr))`: A valid address was stored
    /// - `Ok(None)`: Nothing stored yet
    /// - `Err(Error::Persistence)`: Unreadable or corrupt
    async fn read(&self) -> Result<Option<IpAddr>, crate::Error>;

    /// Overwrite the stored address
    async fn write(&self, ip: IpAddr) -> Result<(), crate::Error>;

    /// Human-readable location, for logs
    fn location(&self) -> String;
}
