//! Server-assigned object identifiers
//!
//! Azure DevOps hands out two flavors of ids: small integers (build and
//! release definitions, queues, variable groups, policies) and GUID strings
//! (repositories, identities, endpoints, task groups, wikis, feeds). The
//! snapshot must write back whichever shape it read, so `ObjectId` keeps the
//! JSON type instead of normalizing everything to strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// An id exactly as the server returned it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Number(i64),
    Text(String),
}

impl ObjectId {
    /// Read an id from a JSON value; empty strings and non-scalars are not ids
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Self::Number),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Write the id back as JSON, preserving its original type
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Lookup key: GUIDs compare case-insensitively, numbers by value.
    ///
    /// A numeric id and its decimal string produce the same key, because
    /// some payloads carry integer ids as strings (release artifacts).
    pub fn key(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_lowercase(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ObjectId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_keeps_type() {
        assert_eq!(ObjectId::from_value(&json!(12)), Some(ObjectId::Number(12)));
        assert_eq!(
            ObjectId::from_value(&json!("ABC-def")),
            Some(ObjectId::Text("ABC-def".into()))
        );
        assert_eq!(ObjectId::from_value(&json!("")), None);
        assert_eq!(ObjectId::from_value(&json!(null)), None);
        assert_eq!(ObjectId::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn test_to_value_round_trips_shape() {
        assert_eq!(ObjectId::Number(7).to_value(), json!(7));
        assert_eq!(ObjectId::from("x").to_value(), json!("x"));
    }

    #[test]
    fn test_key_is_case_insensitive_for_guids() {
        let upper = ObjectId::from("AAAA-BBBB");
        let lower = ObjectId::from("aaaa-bbbb");
        assert_eq!(upper.key(), lower.key());
    }

    #[test]
    fn test_numeric_string_shares_key_with_number() {
        assert_eq!(ObjectId::from("42").key(), ObjectId::Number(42).key());
        assert_eq!(ObjectId::from("42").as_i64(), Some(42));
    }

    #[test]
    fn test_serde_untagged() {
        let id: ObjectId = serde_json::from_str("5").unwrap();
        assert_eq!(id, ObjectId::Number(5));
        let id: ObjectId = serde_json::from_str("\"g\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"g\"");
    }
}
