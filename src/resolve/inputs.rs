//! Free-form task inputs
//!
//! Pipeline steps carry their settings as an untyped `inputs` map. Service
//! connection ids hide in it under a handful of conventional keys; those are
//! remapped best-effort and anything unresolved stays as it was.

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{MissPolicy, ReferenceMap};

/// Input names that conventionally hold a service connection id
const ENDPOINT_INPUT_KEYS: &[&str] = &[
    "containerregistry",
    "connectedservicename",
    "connectedservicenamearm",
    "azuresubscription",
    "azureresourcemanagerconnection",
    "dockerregistryserviceconnection",
    "kubernetesserviceendpoint",
    "externalendpoint",
    "serviceconnection",
    "endpoint",
    "subscription",
];

pub fn is_endpoint_input(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    ENDPOINT_INPUT_KEYS.contains(&key.as_str())
}

/// Hyphenated 8-4-4-4-12 GUID
pub fn looks_like_guid(value: &str) -> bool {
    value.len() == 36 && Uuid::parse_str(value).is_ok()
}

/// Remap endpoint references inside an `inputs` map.
///
/// Keys on the allow-list are always tried; with `guid_values` set, any
/// GUID-shaped value is tried as well (task groups reference endpoints
/// through their own parameter names). Returns how many inputs changed.
pub fn remap_inputs(inputs: &mut Map<String, Value>, endpoints: &ReferenceMap, guid_values: bool) -> usize {
    let mut changed = 0;
    for (key, value) in inputs.iter_mut() {
        let candidate = is_endpoint_input(key)
            || (guid_values && value.as_str().is_some_and(looks_like_guid));
        if !candidate {
            continue;
        }
        // KeepStale never abandons the object
        if let Ok(true) = endpoints.remap_value(value, MissPolicy::KeepStale) {
            debug!(input = %key, "endpoint input remapped");
            changed += 1;
        }
    }
    changed
}

/// Point a step's `task.id` at the target task group when it references one.
/// Built-in tasks are not in the task group listing and stay untouched.
pub fn remap_task_reference(task: &mut Map<String, Value>, task_groups: &ReferenceMap) -> bool {
    match task.get_mut("id") {
        Some(id) => matches!(task_groups.remap_value(id, MissPolicy::KeepStale), Ok(true)),
        None => false,
    }
}
