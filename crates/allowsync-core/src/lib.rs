// # allowsync-core
//
// Core library for DNS-driven allow-list synchronization.
//
// ## Architecture Overview
//
// - **NameResolver**: hostnames → desired addresses
// - **AllowListProvider / SecurityRuleProvider**: the two remote allow-list shapes,
//   wrapped in the tagged [`Backend`]
// - **Reconciler**: fetch → diff → apply, no retries, no caching of remote state
// - **IdempotencyCache**: last successfully applied address (server mode only)
// - **ReportGate / run_once**: the server and one-shot trigger drivers
// - **ProviderRegistry**: plugin-based registry for providers
//
// ## Design Principles
//
// 1. **Fresh reads**: remote state is fetched on every reconciliation
// 2. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 3. **Library-First**: The daemon is a thin shell over this crate
// 4. **Idempotency**: re-running reconciliation converges without side effects

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod registry;
pub mod traits;
pub mod trigger;

// Re-export core types for convenience
pub use cache::{FileCacheStore, IdempotencyCache, MemoryCacheStore};
pub use config::{AllowSyncConfig, ProviderConfig, ProviderKind, TransportConfig};
pub use error::{Error, Result};
pub use model::{AllowListEntry, DesiredSet, Diff, ReconcileOutcome, SecurityRule};
pub use reconciler::Reconciler;
pub use registry::ProviderRegistry;
pub use traits::{AllowListProvider, Backend, CacheStore, NameResolver, SecurityRuleProvider};
pub use trigger::{ReportGate, ReportOutcome};
