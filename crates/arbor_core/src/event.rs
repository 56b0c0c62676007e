use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::Timestamp;

/// A domain event pending journaling. Entities stay data-only: events are
/// handed to `create`/`save` alongside the entity and land in the sibling
/// event table tagged with the entity's id and version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub kind: String,
    pub timestamp: Timestamp,
    pub payload: JsonValue,
}

impl EntityEvent {
    pub fn new(kind: impl Into<String>, timestamp: Timestamp, payload: JsonValue) -> Self {
        Self {
            kind: kind.into(),
            timestamp,
            payload,
        }
    }
}
