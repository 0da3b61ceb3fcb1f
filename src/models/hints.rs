//! Backup hints
//!
//! Facts captured at backup time that the target scope cannot give back at
//! restore time: who a reviewer id was, and what name a numerically
//! referenced build definition had. They live inside the snapshot under
//! [`HINTS_KEY`] and are stripped by the sanitizer before replay.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::ResourceDocument;
use super::ids::ObjectId;

/// Reserved top-level snapshot key holding [`BackupHints`]
pub const HINTS_KEY: &str = "_backupHints";

/// Resolvable facts about one identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityHint {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unique_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
}

impl IdentityHint {
    /// Extract a hint from an identity record.
    ///
    /// Identity records differ between users, groups and service
    /// principals, so both names walk a list of fallbacks.
    pub fn from_identity(record: &ResourceDocument) -> Self {
        let display_name = ["displayName", "providerDisplayName", "customDisplayName"]
            .iter()
            .find_map(|key| non_empty(record.get(key)))
            .unwrap_or_default();

        let unique_name = ["uniqueName", "signInAddress", "mailAddress"]
            .iter()
            .find_map(|key| non_empty(record.get(key)))
            .or_else(|| {
                ["Account", "Mail", "SignInAddress", "Email"]
                    .iter()
                    .find_map(|prop| {
                        non_empty(record.pointer(&format!("/properties/{}/$value", prop)))
                    })
            })
            .unwrap_or_default();

        Self {
            unique_name,
            display_name,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unique_name.is_empty() && self.display_name.is_empty()
    }
}

/// Side-channel facts embedded in a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupHints {
    /// Source identity id (lowercased) to resolvable names
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub identities: BTreeMap<String, IdentityHint>,

    /// Source build definition id to its name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub build_definitions: BTreeMap<String, String>,
}

impl BackupHints {
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty() && self.build_definitions.is_empty()
    }

    pub fn add_identity(&mut self, id: &str, hint: IdentityHint) {
        if !hint.is_empty() {
            self.identities.insert(id.trim().to_lowercase(), hint);
        }
    }

    pub fn identity(&self, id: &str) -> Option<&IdentityHint> {
        self.identities.get(&id.trim().to_lowercase())
    }

    pub fn add_build_definition(&mut self, id: &ObjectId, name: &str) {
        if !name.trim().is_empty() {
            self.build_definitions.insert(id.key(), name.to_string());
        }
    }

    pub fn build_definition_name(&self, id: &ObjectId) -> Option<&str> {
        self.build_definitions.get(&id.key()).map(String::as_str)
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
