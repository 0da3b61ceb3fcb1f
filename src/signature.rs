//! Duplicate detection
//!
//! Named kinds are matched by case-insensitive name. Branch policies have no
//! name, so they get a signature built from their type, their scopes and the
//! few settings that tell two policies of the same type apart.

use serde_json::{Map, Value};

use crate::models::{ObjectSummary, ResourceDocument};

/// Settings that distinguish policies sharing a type and scope
const SIGNATURE_SETTINGS: &[(&str, &str)] = &[
    ("minimumApproverCount", "min"),
    ("allowDownvotes", "downvotes"),
    ("creatorVoteCounts", "creator"),
];

/// `{type}||{scope,scope,...}||min=..||downvotes=..||creator=..`
///
/// Each scope is `{repositoryId|null}|{refName}|{matchKind}`, lowercased and
/// sorted so listing order and id casing do not matter.
pub fn policy_signature(doc: &ResourceDocument) -> String {
    let type_name = doc.type_name().unwrap_or_default();
    let settings = doc.settings();

    let mut scopes: Vec<String> = settings
        .and_then(|s| s.get("scope"))
        .and_then(Value::as_array)
        .map(|scopes| scopes.iter().filter_map(Value::as_object).map(scope_descriptor).collect())
        .unwrap_or_default();
    scopes.sort();

    let mut signature = format!("{}||{}", type_name, scopes.join(","));
    if let Some(settings) = settings {
        for (key, label) in SIGNATURE_SETTINGS {
            if let Some(value) = settings.get(*key).and_then(setting_text) {
                signature.push_str(&format!("||{}={}", label, value));
            }
        }
    }
    signature
}

fn scope_descriptor(scope: &Map<String, Value>) -> String {
    let repo = match scope.get("repositoryId") {
        Some(Value::String(id)) if !id.is_empty() => id.to_lowercase(),
        _ => "null".to_string(),
    };
    let ref_name = scope.get("refName").and_then(Value::as_str).unwrap_or_default();
    let match_kind = scope.get("matchKind").and_then(Value::as_str).unwrap_or_default();
    format!("{}|{}|{}", repo, ref_name.to_lowercase(), match_kind.to_lowercase())
}

/// Normalized text for a scalar setting: `2.0` and `2` are the same count
fn setting_text(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(|f| (f as i64).to_string()).unwrap_or_default(),
        }),
        Value::String(s) => Some(s.to_lowercase()),
        _ => None,
    }
}

/// First target policy with the same signature
pub fn find_duplicate<'a>(signature: &str, targets: &'a [ObjectSummary]) -> Option<&'a ObjectSummary> {
    targets
        .iter()
        .find(|candidate| policy_signature(&candidate.record) == signature)
}

/// First target object with the same name, case-insensitive
pub fn find_by_name<'a>(name: &str, targets: &'a [ObjectSummary]) -> Option<&'a ObjectSummary> {
    let name = name.trim();
    targets.iter().find(|candidate| candidate.name.trim().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObjectId, ResourceKind};
    use serde_json::json;

    fn policy(id: i64, repo: &str, min: Value) -> ResourceDocument {
        ResourceDocument::from_value(json!({
            "id": id,
            "revision": id,
            "type": {"id": "fa4e907d", "displayName": "Minimum number of reviewers"},
            "isEnabled": true,
            "settings": {
                "minimumApproverCount": min,
                "creatorVoteCounts": false,
                "scope": [{"repositoryId": repo, "refName": "refs/heads/main", "matchKind": "Exact"}]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_signature_format() {
        let sig = policy_signature(&policy(1, "ABC", json!(2)));
        assert_eq!(
            sig,
            "Minimum number of reviewers||abc|refs/heads/main|exact||min=2||creator=false"
        );
    }

    #[test]
    fn test_same_policy_different_ids_same_signature() {
        assert_eq!(
            policy_signature(&policy(1, "abc", json!(2))),
            policy_signature(&policy(99, "ABC", json!(2.0)))
        );
    }

    #[test]
    fn test_different_settings_differ() {
        assert_ne!(
            policy_signature(&policy(1, "abc", json!(2))),
            policy_signature(&policy(1, "abc", json!(3)))
        );
    }

    #[test]
    fn test_scope_order_does_not_matter() {
        let mk = |scopes: Value| {
            ResourceDocument::from_value(json!({
                "type": {"displayName": "Build"},
                "settings": {"scope": scopes}
            }))
            .unwrap()
        };
        let a = mk(json!([
            {"repositoryId": "r1", "refName": "refs/heads/main", "matchKind": "Exact"},
            {"repositoryId": null, "refName": "refs/heads/release", "matchKind": "Prefix"}
        ]));
        let b = mk(json!([
            {"repositoryId": null, "refName": "refs/heads/release", "matchKind": "Prefix"},
            {"repositoryId": "r1", "refName": "refs/heads/main", "matchKind": "Exact"}
        ]));
        assert_eq!(policy_signature(&a), policy_signature(&b));
        assert!(policy_signature(&a).contains("null|refs/heads/release|prefix"));
    }

    #[test]
    fn test_find_duplicate_and_by_name() {
        let existing = ObjectSummary::from_record(ResourceKind::BranchPolicy, policy(50, "abc", json!(2))).unwrap();
        let targets = vec![existing];
        let sig = policy_signature(&policy(1, "abc", json!(2)));
        assert_eq!(find_duplicate(&sig, &targets).map(|s| s.id.clone()), Some(ObjectId::Number(50)));

        let named = vec![ObjectSummary {
            id: ObjectId::Number(1),
            name: "Shared Vars".into(),
            record: ResourceDocument::new(),
        }];
        assert!(find_by_name("shared vars", &named).is_some());
        assert!(find_by_name("other", &named).is_none());
    }
}
