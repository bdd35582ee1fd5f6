//! Balance store contract and backends.
//!
//! The credit manager keeps no balance state of its own. Every balance lives in
//! a key-value store with per-key expiry, and the remaining TTL of a key is what
//! drives replenishment.

use async_trait::async_trait;
use thiserror::Error;

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// TTL reported for a key that exists but has no expiry.
pub const TTL_NO_EXPIRY: i64 = -1;
/// TTL reported for a key that does not exist.
pub const TTL_MISSING: i64 = -2;

/// Errors raised by a balance store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to connect to store: {0}")]
    Connection(String),
    #[error("Store command failed: {0}")]
    Command(String),
}

/// Key-value store with per-key TTL, as seen by the credit manager.
///
/// TTL values follow Redis conventions: remaining whole seconds, or
/// [`TTL_NO_EXPIRY`] / [`TTL_MISSING`].
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Whether the key currently exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Read the integer stored at `key`.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Store `value` at `key`, clearing any previous expiry.
    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError>;

    /// Expire `key` after `seconds`.
    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError>;

    /// Remaining time to live of `key` in seconds.
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;

    /// Store `value` and (re)start its expiry countdown.
    ///
    /// The default issues `set` followed by `expire`; backends that can do both
    /// in one round-trip should override it.
    async fn set_with_ttl(&self, key: &str, value: i64, seconds: u64) -> Result<(), StoreError> {
        self.set(key, value).await?;
        self.expire(key, seconds).await
    }
}
