//! Open, order-preserving resource document
//!
//! Objects are kept as the raw JSON map the server returned. Only a handful
//! of fields are read through typed lenses (`id`, `name`, `type_name`,
//! `settings`); everything else round-trips untouched, in its original key
//! order, from backup through restore.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::hints::{BackupHints, HINTS_KEY};
use super::ids::ObjectId;
use crate::error::{VaultError, VaultResult};

/// One object exactly as returned by the source API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceDocument(Map<String, Value>);

impl ResourceDocument {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value; only objects are documents
    pub fn from_value(value: Value) -> VaultResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(VaultError::Validation(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Parse raw bytes into a document
    pub fn from_slice(bytes: &[u8]) -> VaultResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove a top-level key, keeping the order of the remaining keys
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// JSON-pointer lookup (`/configuration/repository/id`)
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let (head, tail) = split_pointer(pointer)?;
        let value = self.0.get(head)?;
        match tail {
            Some(tail) => value.pointer(tail),
            None => Some(value),
        }
    }

    pub fn pointer_mut(&mut self, pointer: &str) -> Option<&mut Value> {
        let (head, tail) = split_pointer(pointer)?;
        let value = self.0.get_mut(head)?;
        match tail {
            Some(tail) => value.pointer_mut(tail),
            None => Some(value),
        }
    }

    /// Non-empty string at a JSON pointer
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Server-assigned id, in its original JSON type
    pub fn id(&self) -> Option<ObjectId> {
        self.0.get("id").and_then(ObjectId::from_value)
    }

    /// Natural name of the object, if the kind has one
    pub fn name(&self) -> Option<&str> {
        self.str_at("/name")
    }

    /// `type` as a display string: either a bare string, or the
    /// `displayName` of a type reference (branch policies)
    pub fn type_name(&self) -> Option<&str> {
        match self.0.get("type")? {
            Value::String(s) if !s.is_empty() => Some(s.as_str()),
            Value::Object(obj) => obj
                .get("displayName")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    pub fn settings(&self) -> Option<&Map<String, Value>> {
        self.0.get("settings").and_then(Value::as_object)
    }

    pub fn settings_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.0.get_mut("settings").and_then(Value::as_object_mut)
    }

    /// Backup hints embedded under the reserved key, if any
    pub fn hints(&self) -> VaultResult<Option<BackupHints>> {
        match self.0.get(HINTS_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| VaultError::Json(format!("invalid {}: {}", HINTS_KEY, e))),
        }
    }

    /// Embed hints; empty hints leave the document untouched
    pub fn set_hints(&mut self, hints: &BackupHints) -> VaultResult<()> {
        if hints.is_empty() {
            return Ok(());
        }
        self.0.insert(HINTS_KEY.to_string(), serde_json::to_value(hints)?);
        Ok(())
    }

    /// Pretty JSON as written to snapshot files
    pub fn to_pretty_json(&self) -> VaultResult<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }
}

impl From<Map<String, Value>> for ResourceDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn split_pointer(pointer: &str) -> Option<(&str, Option<&str>)> {
    let rest = pointer.strip_prefix('/')?;
    Some(match rest.find('/') {
        Some(idx) => (&rest[..idx], Some(&rest[idx..])),
        None => (rest, None),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
