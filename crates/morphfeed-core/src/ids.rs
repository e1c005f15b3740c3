//! Identifier generation
//!
//! Asset ids and run correlation ids come from the same UUID-class source.
//! The generator is injected so tests can produce predictable ids.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Source of unique identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Identifier shared by every branch of one logical user action.
///
/// Generated once per run and copied into each branch; it is only ever read
/// after creation, so sharing it across concurrent branches is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn generate(ids: &dyn IdGenerator) -> Self {
        Self(ids.next_id())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_generator_is_unique() {
        let ids = UuidGenerator;
        assert_ne!(ids.next_id(), ids.next_id());
    }

    #[test]
    fn test_correlation_id_serializes_as_plain_uuid() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(CorrelationId::new(id)).unwrap();
        assert_eq!(json, serde_json::json!(id.to_string()));
    }
}
