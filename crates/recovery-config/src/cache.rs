//! Host-side cache of fetched configurations.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProviderConfiguration;

/// Cache of fetched configurations, keyed by origin.
///
/// Slot replacement is publish-after-construct: a configuration is fully
/// built before the `Arc` is swapped in, so readers only ever observe
/// complete values. Stale entries are still returned; the caller decides
/// when to re-fetch by observing `is_expired()`.
pub trait ConfigCache: Send + Sync {
    fn get(&self, origin: &str) -> Option<Arc<ProviderConfiguration>>;
    fn put(&self, origin: &str, config: ProviderConfiguration) -> Arc<ProviderConfiguration>;
}

/// In-memory, process-lifetime configuration cache.
#[derive(Debug, Default)]
pub struct MemoryConfigCache {
    slots: RwLock<HashMap<String, Arc<ProviderConfiguration>>>,
}

impl MemoryConfigCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigCache for MemoryConfigCache {
    fn get(&self, origin: &str) -> Option<Arc<ProviderConfiguration>> {
        self.slots.read().get(origin).cloned()
    }

    fn put(&self, origin: &str, config: ProviderConfiguration) -> Arc<ProviderConfiguration> {
        let config = Arc::new(config);
        self.slots
            .write()
            .insert(origin.to_string(), Arc::clone(&config));
        config
    }
}
