//! Provider storage for a registry
//!
//! Uses DashMap for sharded concurrent access. The map's shard locks only
//! guard the map structure: lookups clone the provider's `Arc` and release
//! the shard before any strategy runs.

use crate::provider::Provider;
use crate::types::TypeKey;
use crate::{DiError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::TypeId;
use std::sync::Arc;

/// Shard count for provider maps.
///
/// Registries typically hold a few dozen providers, so the DashMap default
/// (num_cpus * 4) mostly costs creation time.
const DEFAULT_SHARDS: usize = 8;

/// Thread-safe map from type to provider, plus the parent link
pub(crate) struct ProviderStorage {
    /// Map from TypeId to provider
    providers: DashMap<TypeId, Arc<Provider>, RandomState>,
    /// Optional parent storage for chained lookup
    parent: Option<Arc<ProviderStorage>>,
    /// Number of ancestors (0 = root)
    depth: u32,
}

impl ProviderStorage {
    /// Create new empty root storage
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create root storage with pre-allocated capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        // Scale shards based on expected capacity
        let shard_amount = if capacity <= 16 {
            DEFAULT_SHARDS
        } else if capacity <= 64 {
            16
        } else {
            32
        };
        Self {
            providers: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
            parent: None,
            depth: 0,
        }
    }

    /// Create a child storage that falls back to this one.
    #[inline]
    pub fn child(self: &Arc<Self>) -> Self {
        Self {
            providers: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                RandomState::new(),
                DEFAULT_SHARDS,
            ),
            parent: Some(Arc::clone(self)),
            depth: self.depth + 1,
        }
    }

    /// Insert a provider under its key, failing if the key is taken
    pub fn insert(&self, provider: Provider) -> Result<Arc<Provider>> {
        let key = provider.key();
        match self.providers.entry(key.id()) {
            Entry::Occupied(_) => Err(DiError::DuplicateProvider {
                type_name: key.name(),
            }),
            Entry::Vacant(slot) => {
                let provider = Arc::new(provider);
                slot.insert(Arc::clone(&provider));
                Ok(provider)
            }
        }
    }

    /// Insert several providers, all or none.
    pub fn insert_all(&self, providers: Vec<Provider>) -> Result<Vec<Arc<Provider>>> {
        // Collisions among the batch itself and with what is already bound
        for (i, provider) in providers.iter().enumerate() {
            let key = provider.key();
            let repeated = providers[..i].iter().any(|earlier| earlier.key() == key);
            if repeated || self.contains(&key.id()) {
                return Err(DiError::DuplicateProvider {
                    type_name: key.name(),
                });
            }
        }

        let mut inserted = Vec::with_capacity(providers.len());
        for provider in providers {
            match self.insert(provider) {
                Ok(provider) => inserted.push(provider),
                Err(err) => {
                    // Lost a race with a concurrent registration
                    for provider in &inserted {
                        self.remove(&provider.key().id());
                    }
                    return Err(err);
                }
            }
        }
        Ok(inserted)
    }

    /// Check if type exists in this storage
    #[inline]
    pub fn contains(&self, type_id: &TypeId) -> bool {
        self.providers.contains_key(type_id)
    }

    /// Provider registered in this storage
    #[inline]
    pub fn get(&self, type_id: &TypeId) -> Option<Arc<Provider>> {
        self.providers.get(type_id).map(|p| Arc::clone(p.value()))
    }

    /// Find a provider by walking the parent chain.
    ///
    /// Returns the provider from the nearest storage that has one, together
    /// with that storage.
    pub fn lookup(
        self: &Arc<Self>,
        type_id: &TypeId,
    ) -> Option<(Arc<ProviderStorage>, Arc<Provider>)> {
        let mut current = Some(self);
        while let Some(storage) = current {
            if let Some(provider) = storage.get(type_id) {
                return Some((Arc::clone(storage), provider));
            }
            current = storage.parent.as_ref();
        }
        None
    }

    /// Check if a provider exists in this storage or any parent.
    #[inline]
    pub fn contains_in_chain(&self, type_id: &TypeId) -> bool {
        if self.contains(type_id) {
            return true;
        }

        let mut current = self.parent.as_ref();
        while let Some(storage) = current {
            if storage.contains(type_id) {
                return true;
            }
            current = storage.parent.as_ref();
        }

        false
    }

    /// Get reference to parent storage (if any)
    #[inline]
    pub fn parent(&self) -> Option<&Arc<ProviderStorage>> {
        self.parent.as_ref()
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Get number of registered providers
    #[inline]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Remove a provider
    #[inline]
    pub fn remove(&self, type_id: &TypeId) -> bool {
        self.providers.remove(type_id).is_some()
    }

    /// Keys of all providers in this storage
    pub fn type_keys(&self) -> Vec<TypeKey> {
        self.providers.iter().map(|r| r.value().key()).collect()
    }
}

impl Default for ProviderStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderStorage")
            .field("count", &self.len())
            .field("depth", &self.depth)
            .finish()
    }
}
