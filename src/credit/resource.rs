//! The regulated-resource capability and resource identity.

use serde::{Deserialize, Serialize};

/// Opaque, stable identity of a regulated resource.
///
/// Processes that should share one balance must agree on the identity, so
/// long-lived resources usually carry an explicit id. [`ResourceId::generate`]
/// is for resources whose balance only matters to a single process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap an explicit identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A resource whose consumption is limited to a number of credits per minute.
pub trait RegulatedResource {
    /// Maximum credits this resource may spend in one 60 second window.
    fn credits_per_minute(&self) -> i64;

    /// Identity of this resource instance.
    fn resource_id(&self) -> ResourceId;

    /// Tag naming the concrete resource type.
    ///
    /// Combined with the id so that two types handing out the same ids never
    /// share a balance. The default is the Rust type name, which can change
    /// between compiler versions; override it when processes built separately
    /// must share balances.
    fn type_tag(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A ready-made regulated resource with a fixed quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResource {
    id: ResourceId,
    credits_per_minute: i64,
    tag: Option<String>,
}

impl StaticResource {
    pub fn new(id: impl Into<ResourceId>, credits_per_minute: i64) -> Self {
        Self {
            id: id.into(),
            credits_per_minute,
            tag: None,
        }
    }

    /// Use `tag` instead of the Rust type name when deriving the balance key.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl RegulatedResource for StaticResource {
    fn credits_per_minute(&self) -> i64 {
        self.credits_per_minute
    }

    fn resource_id(&self) -> ResourceId {
        self.id.clone()
    }

    fn type_tag(&self) -> &str {
        self.tag
            .as_deref()
            .unwrap_or(std::any::type_name::<Self>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ResourceId::generate(), ResourceId::generate());
    }

    #[test]
    fn test_explicit_id_round_trips() {
        let id = ResourceId::new("billing-api");
        assert_eq!(id.as_str(), "billing-api");
        assert_eq!(id.to_string(), "billing-api");
        assert_eq!(ResourceId::from("billing-api"), id);
    }

    #[test]
    fn test_static_resource_tag() {
        let plain = StaticResource::new("a", 10);
        assert!(plain.type_tag().ends_with("StaticResource"));

        let tagged = StaticResource::new("a", 10).with_tag("geocoder");
        assert_eq!(tagged.type_tag(), "geocoder");
        assert_eq!(tagged.credits_per_minute(), 10);
        assert_eq!(tagged.resource_id(), ResourceId::new("a"));
    }
}
