use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{RefId, Timestamp};

/// Serialization context a codec targets. The persistence layer only ever
/// asks for `Database`; the other realms exist so one registry can serve the
/// outer surfaces as well.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Realm {
    Database,
    Web,
    Cli,
}

/// Column classification used by the schema synthesizer. This is the
/// declared, schema-level view of a field; `FieldValue` is the row-level one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Text,
    /// Short human-facing name, stored as VARCHAR(100).
    EntityName,
    Date,
    DateTime,
    /// Structural value stored as JSON text.
    Json,
    /// Reference to another entity's `ref_id`.
    EntityId,
    /// Not-null reference to the owning parent, with a foreign key.
    ParentLink,
}

impl ColumnKind {
    pub fn accepts(self, value: &FieldValue) -> bool {
        if value.is_null() {
            return true;
        }
        matches!(
            (self, value),
            (ColumnKind::Boolean, FieldValue::Bool(_))
                | (ColumnKind::Integer, FieldValue::I64(_))
                | (ColumnKind::Float, FieldValue::F64(_))
                | (ColumnKind::Text, FieldValue::Str(_))
                | (ColumnKind::EntityName, FieldValue::Str(_))
                | (ColumnKind::Date, FieldValue::Date(_))
                | (ColumnKind::DateTime, FieldValue::DateTime(_))
                | (ColumnKind::Json, FieldValue::Json(_))
                | (ColumnKind::EntityId, FieldValue::Ref(_))
                | (ColumnKind::ParentLink, FieldValue::Ref(_))
        )
    }
}

/// Row-shaped value produced by codecs: everything an entity field encodes
/// into, and everything a table column decodes out of.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Date(NaiveDate),
    DateTime(Timestamp),
    Json(JsonValue),
    Ref(RefId),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::I64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::F64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<Timestamp> {
        match self {
            FieldValue::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            FieldValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<RefId> {
        match self {
            FieldValue::Ref(value) => Some(*value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnKind, FieldValue};
    use crate::RefId;

    #[test]
    fn kinds_accept_matching_values() {
        assert!(ColumnKind::Integer.accepts(&FieldValue::I64(5)));
        assert!(ColumnKind::EntityName.accepts(&FieldValue::Str("Home".into())));
        assert!(ColumnKind::ParentLink.accepts(&FieldValue::Ref(RefId::new(1))));
        assert!(!ColumnKind::Integer.accepts(&FieldValue::Str("5".into())));
        assert!(!ColumnKind::Boolean.accepts(&FieldValue::I64(1)));
    }

    #[test]
    fn null_is_accepted_by_every_kind() {
        assert!(ColumnKind::Date.accepts(&FieldValue::Null));
        assert!(ColumnKind::Json.accepts(&FieldValue::Null));
    }
}
