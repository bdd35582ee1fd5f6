//! Process-local registry of regulated resources.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::key::{BalanceKey, ResourceKey};

/// Registry entry for a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredResource {
    /// Credits grantable per minute, always at least 1
    pub quota: i64,
    /// Store slot holding the shared balance
    pub balance_key: BalanceKey,
}

/// Why a registration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Quota below one credit per minute
    InvalidQuota,
    /// The resource already has an entry
    AlreadyRegistered,
}

/// Maps resource identity to its quota and balance key.
///
/// Lookups hand out clones so no lock is held while the caller talks to the
/// store or waits for credits.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: RwLock<HashMap<ResourceKey, RegisteredResource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry unless the quota is invalid or the key is taken.
    pub fn insert(
        &self,
        key: ResourceKey,
        quota: i64,
        balance_key: BalanceKey,
    ) -> Result<(), Rejection> {
        if quota < 1 {
            return Err(Rejection::InvalidQuota);
        }

        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(Rejection::AlreadyRegistered);
        }
        entries.insert(key, RegisteredResource { quota, balance_key });
        Ok(())
    }

    /// Remove an entry, returning it if it existed.
    pub fn remove(&self, key: &ResourceKey) -> Option<RegisteredResource> {
        self.entries.write().remove(key)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<RegisteredResource> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::key::DEFAULT_KEY_PREFIX;
    use crate::credit::{ResourceId, StaticResource};

    fn resource_key(id: &str) -> (ResourceKey, BalanceKey) {
        let key = ResourceKey::of(&StaticResource::new(id, 1));
        let balance_key = BalanceKey::derive(DEFAULT_KEY_PREFIX, &key);
        (key, balance_key)
    }

    #[test]
    fn test_insert_and_get() {
        let registry = ResourceRegistry::new();
        let (key, balance_key) = resource_key("a");

        assert_eq!(registry.insert(key.clone(), 60, balance_key.clone()), Ok(()));

        let entry = registry.get(&key).unwrap();
        assert_eq!(entry.quota, 60);
        assert_eq!(entry.balance_key, balance_key);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rejects_invalid_quota() {
        let registry = ResourceRegistry::new();
        let (key, balance_key) = resource_key("a");

        assert_eq!(
            registry.insert(key.clone(), 0, balance_key.clone()),
            Err(Rejection::InvalidQuota)
        );
        assert_eq!(
            registry.insert(key.clone(), -5, balance_key),
            Err(Rejection::InvalidQuota)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejects_duplicate() {
        let registry = ResourceRegistry::new();
        let (key, balance_key) = resource_key("a");

        registry.insert(key.clone(), 60, balance_key.clone()).unwrap();
        assert_eq!(
            registry.insert(key.clone(), 30, balance_key),
            Err(Rejection::AlreadyRegistered)
        );
        assert_eq!(registry.get(&key).unwrap().quota, 60);
    }

    #[test]
    fn test_remove() {
        let registry = ResourceRegistry::new();
        let (key, balance_key) = resource_key("a");
        registry.insert(key.clone(), 60, balance_key).unwrap();

        assert!(registry.remove(&key).is_some());
        assert!(registry.remove(&key).is_none());
        assert!(!registry.contains(&key));
    }

    #[test]
    fn test_distinct_ids_have_separate_entries() {
        let registry = ResourceRegistry::new();
        let (key_a, balance_a) = resource_key("a");
        let (key_b, balance_b) = resource_key("b");

        registry.insert(key_a.clone(), 10, balance_a).unwrap();
        registry.insert(key_b.clone(), 20, balance_b).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(key_a.id, ResourceId::new("a"));
        assert_eq!(registry.get(&key_b).unwrap().quota, 20);
    }
}
