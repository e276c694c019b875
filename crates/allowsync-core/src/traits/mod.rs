//! Core traits for allow-list synchronization
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AllowListProvider`] / [`SecurityRuleProvider`]: the two remote allow-list shapes
//! - [`NameResolver`]: hostname → addresses
//! - [`CacheStore`]: durable backing for the idempotency cache

pub mod allow_list_provider;
pub mod cache_store;
pub mod name_resolver;

pub use allow_list_provider::{AllowListProvider, Backend, ProviderFactory, SecurityRuleProvider};
pub use cache_store::CacheStore;
pub use name_resolver::{NameResolver, SystemResolver};
