//! Cross-scope reference resolution
//!
//! Every object embeds ids that only mean something in the scope they came
//! from. A [`ReferenceMap`] translates them through names: the source
//! listing gives `source id -> name`, the target listing gives
//! `name -> target id`. Both listings are fetched once per run, before any
//! object is processed, and never change afterwards.
//!
//! What happens on a miss depends on the reference kind ([`MissPolicy`]):
//! repositories and queues skip the object, variable-group lists drop the
//! entry, free-form step inputs keep the stale value.

pub mod identity;
pub mod inputs;
pub mod queue;

pub use identity::IdentityResolver;
pub use inputs::{is_endpoint_input, looks_like_guid, remap_inputs, remap_task_reference};
pub use queue::{parse_queue_map, QueueMatch, QueueResolver, ResolvedQueue};

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ResourceApi;
use crate::error::ApiResult;
use crate::models::{ObjectId, ObjectSummary, ResourceKind, Scope};

/// What to do with a reference that does not resolve in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissPolicy {
    /// Remove the reference from its containing list
    Drop,
    /// Leave the source value in place
    KeepStale,
    /// Abandon the whole object
    Skip,
}

/// A critical reference that could not be translated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub kind: ResourceKind,
    pub reference: String,
    pub detail: String,
}

impl Unresolved {
    pub fn new(kind: ResourceKind, reference: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' {}", self.kind, self.reference, self.detail)
    }
}

/// Name-keyed translation table for one reference kind
#[derive(Debug, Clone, Default)]
pub struct ReferenceMap {
    kind: Option<ResourceKind>,
    source_names: HashMap<String, String>,
    target_ids: HashMap<String, ObjectId>,
    target_names: HashMap<String, String>,
}

impl ReferenceMap {
    /// List `kind` in both scopes and index the results
    pub fn build(
        api: &dyn ResourceApi,
        kind: ResourceKind,
        source: &Scope,
        target: &Scope,
    ) -> ApiResult<Self> {
        let source_objects = api.list(source, kind)?;
        let target_objects = api.list(target, kind)?;
        Ok(Self::from_listings(kind, &source_objects, &target_objects))
    }

    /// Index only the target side; source names come from hints or the
    /// documents themselves
    pub fn target_only(api: &dyn ResourceApi, kind: ResourceKind, target: &Scope) -> ApiResult<Self> {
        let target_objects = api.list(target, kind)?;
        Ok(Self::from_listings(kind, &[], &target_objects))
    }

    pub fn from_listings(kind: ResourceKind, source: &[ObjectSummary], target: &[ObjectSummary]) -> Self {
        let mut map = Self {
            kind: Some(kind),
            ..Self::default()
        };

        for obj in source.iter().filter(|o| !o.name.is_empty()) {
            map.source_names
                .entry(obj.id.key())
                .or_insert_with(|| obj.name.clone());
        }

        for obj in target.iter().filter(|o| !o.name.is_empty()) {
            let key = obj.name.to_lowercase();
            if let Some(existing) = map.target_ids.get(&key) {
                // First listed wins; the rest are unreachable by name
                warn!(
                    kind = %kind,
                    name = %obj.name,
                    kept = %existing,
                    ignored = %obj.id,
                    "duplicate name in target scope"
                );
                continue;
            }
            map.target_ids.insert(key, obj.id.clone());
            map.target_names.insert(obj.id.key(), obj.name.clone());
        }
        map
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        self.kind
    }

    /// Name of a source-scope object
    pub fn source_name(&self, source_id: &ObjectId) -> Option<&str> {
        self.source_names.get(&source_id.key()).map(String::as_str)
    }

    /// Target id for a name, case-insensitive
    pub fn target_id(&self, name: &str) -> Option<&ObjectId> {
        self.target_ids.get(&name.trim().to_lowercase())
    }

    /// Canonical (target-cased) name of a target object
    pub fn target_name(&self, target_id: &ObjectId) -> Option<&str> {
        self.target_names.get(&target_id.key()).map(String::as_str)
    }

    /// Source id -> source name -> target id
    pub fn remap(&self, source_id: &ObjectId) -> Option<&ObjectId> {
        let name = self.source_name(source_id)?;
        let target = self.target_id(name);
        debug!(kind = ?self.kind, source = %source_id, name, found = target.is_some(), "remap");
        target
    }

    /// Remap a scalar JSON id in place, keeping its JSON type.
    ///
    /// Returns `Ok(true)` when mapped, `Ok(false)` when the miss was left in
    /// place, `Err` when the policy says to abandon the object. `Drop` is
    /// handled by [`ReferenceMap::remap_list`]; on a scalar it keeps the value.
    pub fn remap_value(&self, value: &mut Value, policy: MissPolicy) -> Result<bool, Unresolved> {
        let Some(source_id) = ObjectId::from_value(value) else {
            return Ok(false);
        };
        match self.remap(&source_id) {
            Some(target) => {
                *value = shaped_like(target, value);
                Ok(true)
            }
            None if policy == MissPolicy::Skip => Err(self.unresolved(&source_id)),
            None => Ok(false),
        }
    }

    /// Remap a list of ids; entries may be bare ids or `{ "id": ... }`
    /// objects. Misses follow `policy`; returns the number of dropped entries.
    pub fn remap_list(&self, list: &mut Vec<Value>, policy: MissPolicy) -> Result<usize, Unresolved> {
        let before = list.len();
        let mut kept = Vec::with_capacity(before);

        for mut entry in list.drain(..) {
            let slot = if entry.is_object() {
                entry.get_mut("id")
            } else {
                Some(&mut entry)
            };
            let mapped = match slot {
                Some(slot) => self.remap_value(slot, policy)?,
                None => false,
            };
            if mapped || policy == MissPolicy::KeepStale {
                kept.push(entry);
            }
        }

        *list = kept;
        Ok(before - list.len())
    }

    fn unresolved(&self, source_id: &ObjectId) -> Unresolved {
        let kind = self.kind.unwrap_or(ResourceKind::Repository);
        match self.source_name(source_id) {
            Some(name) => Unresolved::new(kind, name, "has no match in the target scope"),
            None => Unresolved::new(kind, source_id.to_string(), "is not in the source scope listing"),
        }
    }
}

/// Render a target id with the JSON type of the value it replaces
pub fn shaped_like(target: &ObjectId, original: &Value) -> Value {
    match (original, target) {
        (Value::String(_), ObjectId::Number(n)) => Value::String(n.to_string()),
        (Value::Number(_), ObjectId::Text(s)) => match s.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(s.clone()),
        },
        _ => target.to_value(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceDocument;
    use serde_json::json;

    fn summary(id: Value, name: &str) -> ObjectSummary {
        ObjectSummary {
            id: ObjectId::from_value(&id).unwrap(),
            name: name.to_string(),
            record: ResourceDocument::new(),
        }
    }

    fn groups() -> ReferenceMap {
        ReferenceMap::from_listings(
            ResourceKind::VariableGroup,
            &[summary(json!(1), "Shared"), summary(json!(2), "Legacy")],
            &[summary(json!(51), "shared")],
        )
    }

    #[test]
    fn test_remap_through_name_case_insensitive() {
        let map = groups();
        assert_eq!(map.remap(&ObjectId::Number(1)), Some(&ObjectId::Number(51)));
        assert_eq!(map.remap(&ObjectId::Number(2)), None);
        assert_eq!(map.remap(&ObjectId::Number(3)), None);
        assert_eq!(map.target_name(&ObjectId::Number(51)), Some("shared"));
    }

    #[test]
    fn test_first_target_name_wins() {
        let map = ReferenceMap::from_listings(
            ResourceKind::BuildDefinition,
            &[],
            &[summary(json!(10), "CI"), summary(json!(11), "ci")],
        );
        assert_eq!(map.target_id("CI"), Some(&ObjectId::Number(10)));
    }

    #[test]
    fn test_remap_value_keeps_json_type() {
        let map = groups();
        let mut as_string = json!("1");
        assert!(map.remap_value(&mut as_string, MissPolicy::KeepStale).unwrap());
        assert_eq!(as_string, json!("51"));

        let mut as_number = json!(1);
        map.remap_value(&mut as_number, MissPolicy::KeepStale).unwrap();
        assert_eq!(as_number, json!(51));
    }

    #[test]
    fn test_skip_policy_reports_unresolved() {
        let map = groups();
        let mut value = json!(2);
        let err = map.remap_value(&mut value, MissPolicy::Skip).unwrap_err();
        assert_eq!(err.reference, "Legacy");
        assert_eq!(err.to_string(), "variable group 'Legacy' has no match in the target scope");
        assert_eq!(value, json!(2));
    }

    #[test]
    fn test_remap_list_drops_unresolved() {
        let map = groups();
        let mut list = vec![json!(1), json!(2)];
        let dropped = map.remap_list(&mut list, MissPolicy::Drop).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(list, vec![json!(51)]);

        let mut objects = vec![json!({"id": 2}), json!({"id": 1, "name": "x"})];
        map.remap_list(&mut objects, MissPolicy::Drop).unwrap();
        assert_eq!(objects, vec![json!({"id": 51, "name": "x"})]);
    }

    #[test]
    fn test_remap_list_keep_stale() {
        let map = groups();
        let mut list = vec![json!(2)];
        assert_eq!(map.remap_list(&mut list, MissPolicy::KeepStale).unwrap(), 0);
        assert_eq!(list, vec![json!(2)]);
    }
}
