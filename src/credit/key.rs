//! Balance key derivation.

use std::time::Duration;

use sha2::{Digest, Sha256};

use super::resource::{RegulatedResource, ResourceId};

/// Default prefix for balance keys in the store.
pub const DEFAULT_KEY_PREFIX: &str = "credit:balance";

/// Length of the replenishment window. Every balance write restarts it.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Identifies a registered resource: its type fingerprint plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// Hex fingerprint of the resource's type tag
    pub fingerprint: String,
    /// The resource's own identity
    pub id: ResourceId,
}

impl ResourceKey {
    /// Create the key for a resource.
    pub fn of<R: RegulatedResource + ?Sized>(resource: &R) -> Self {
        Self {
            fingerprint: type_fingerprint(resource.type_tag()),
            id: resource.resource_id(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.fingerprint, self.id)
    }
}

/// The store slot holding a resource's shared balance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    key: String,
    ttl: Duration,
}

impl BalanceKey {
    /// Derive the balance key for a resource under `prefix`.
    ///
    /// Format: "{prefix}:{type fingerprint}:{id}"
    pub fn derive(prefix: &str, resource: &ResourceKey) -> Self {
        Self {
            key: format!("{}:{}:{}", prefix, resource.fingerprint, resource.id),
            ttl: WINDOW,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Expiry applied on every write.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }
}

impl std::fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

/// Hex of the first 16 bytes of SHA-256 over the type tag.
fn type_fingerprint(tag: &str) -> String {
    let digest = Sha256::digest(tag.as_bytes());
    hex::encode(&digest[..16])
}
