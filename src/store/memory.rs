//! In-process balance store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{BalanceStore, StoreError, TTL_MISSING, TTL_NO_EXPIRY};

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A balance store held in process memory.
///
/// Expiry is evaluated lazily against tokio's clock, so tests running with a
/// paused runtime see TTLs count down as mocked time advances. Clones share the
/// same underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all keys.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = *entries.get(key)?;
        if entry.is_expired(now) {
            entries.remove(key);
            return None;
        }
        Some(entry)
    }
}

#[async_trait]
impl BalanceStore for InMemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live(key).is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.live(key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let deadline = Instant::now() + Duration::from_secs(seconds);
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let Some(entry) = self.live(key) else {
            return Ok(TTL_MISSING);
        };
        match entry.expires_at {
            None => Ok(TTL_NO_EXPIRY),
            Some(at) => {
                // Rounded to the nearest second, as Redis reports it.
                let remaining = at.saturating_duration_since(Instant::now()).as_millis();
                Ok(((remaining + 500) / 1000) as i64)
            }
        }
    }

    async fn set_with_ttl(&self, key: &str, value: i64, seconds: u64) -> Result<(), StoreError> {
        let deadline = Instant::now() + Duration::from_secs(seconds);
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(deadline),
            },
        );
        Ok(())
    }
}
