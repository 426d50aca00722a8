//! Shared primitive types used across the entire harness.

use crate::error::{HarnessError, HarnessResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// An absolute point in time. The harness runs in a single zone: UTC.
pub type Instant = DateTime<Utc>;

/// Opaque identity of a generated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn parse(s: &str) -> HarnessResult<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single attribute value on a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Text(String),
    Integer(i64),
    Flag(bool),
    Timestamp(Instant),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_)      => "text",
            Self::Integer(_)   => "integer",
            Self::Flag(_)      => "flag",
            Self::Timestamp(_) => "timestamp",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Instant> {
        match self {
            Self::Timestamp(at) => Some(*at),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self { Self::Text(s.to_string()) }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self { Self::Integer(n) }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self { Self::Flag(b) }
}

impl From<Instant> for AttrValue {
    fn from(at: Instant) -> Self { Self::Timestamp(at) }
}

/// A generated test record: identity, kind, and named attribute values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id:         RecordId,
    kind:       String,
    attributes: BTreeMap<String, AttrValue>,
}

impl Record {
    pub fn new(id: RecordId, kind: impl Into<String>, attributes: BTreeMap<String, AttrValue>) -> Self {
        Self { id, kind: kind.into(), attributes }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn get(&self, attribute: &str) -> Option<&AttrValue> {
        self.attributes.get(attribute)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attributes
    }

    /// Read a timestamp attribute, failing loudly if it is absent or of
    /// another type.
    pub fn timestamp(&self, attribute: &str) -> HarnessResult<Instant> {
        let value = self.get(attribute).ok_or_else(|| HarnessError::MissingAttribute {
            record:    self.id,
            attribute: attribute.to_string(),
        })?;
        value.as_timestamp().ok_or_else(|| HarnessError::AttributeType {
            record:    self.id,
            attribute: attribute.to_string(),
            expected:  "timestamp",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample() -> Record {
        let mut attributes = BTreeMap::new();
        attributes.insert("title".to_string(), AttrValue::from("Post 1"));
        attributes.insert(
            "created_at".to_string(),
            AttrValue::from(crate::calendar::ymd(2017, 4, 30).unwrap()),
        );
        Record::new(RecordId::from_uuid(Uuid::from_u128(7)), "post", attributes)
    }

    #[test]
    fn record_serialises_with_string_id() {
        let record = sample();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000007");
        assert_eq!(json["attributes"]["title"]["type"], "text");

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn attribute_values_hash_by_content() {
        let values: HashSet<AttrValue> = [
            AttrValue::from("a"),
            AttrValue::from("a"),
            AttrValue::from(1i64),
            AttrValue::from(true),
        ]
        .into_iter()
        .collect();
        assert_eq!(values.len(), 3);
    }
}
