use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::traits::DataAdapter;

/// Named data-source adapters
///
/// Registration is rare and reads are frequent; concurrent registrations of
/// the same name resolve last-writer-wins.
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn DataAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
        }
    }

    /// Insert an adapter, replacing any adapter already registered under `name`
    pub fn register(&self, name: impl Into<String>, adapter: Arc<dyn DataAdapter>) {
        let name = name.into();
        let categories = adapter.supported_categories().len();

        if self.adapters.insert(name.clone(), adapter).is_some() {
            warn!("Adapter '{}' already registered, overwriting", name);
        } else {
            info!("📡 Registered adapter '{}' ({} categories)", name, categories);
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.adapters.remove(name).is_some();
        if removed {
            info!("Unregistered adapter '{}'", name);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DataAdapter>> {
        self.adapters.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered adapter names, sorted
    pub fn list_all(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
