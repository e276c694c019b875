//! Plugin-based provider registry
//!
//! The registry lets allow-list providers be registered at runtime, so the
//! daemon never branches on provider type.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use allowsync_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! allowsync_provider_cloudflare::register(&registry);
//! allowsync_provider_oci::register(&registry);
//!
//! let backend = registry.create_backend(&config)?;
//! ```

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::AllowSyncConfig;
use crate::error::{Error, Result};
use crate::traits::{Backend, ProviderFactory};

type FactoryMap = HashMap<String, Box<dyn ProviderFactory>>;

/// Provider registry keyed by provider type name
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<FactoryMap>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare", "oci")
    /// - `factory`: Factory object for creating backends
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn ProviderFactory>) {
        self.write().insert(name.into(), factory);
    }

    /// Create a backend for the configured provider
    ///
    /// # Returns
    ///
    /// - `Ok(Backend)`: Created backend
    /// - `Err(Error::UnsupportedProvider)`: Provider type is not registered
    /// - `Err(_)`: The factory rejected the configuration
    pub fn create_backend(&self, config: &AllowSyncConfig) -> Result<Backend> {
        let provider_type = config.provider.type_name();
        let providers = self.read();

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::unsupported_provider(provider_type))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    // A panicking factory cannot leave the map half-written, so a poisoned
    // lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, FactoryMap> {
        self.providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FactoryMap> {
        self.providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
