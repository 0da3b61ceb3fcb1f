//! Agent queue resolution
//!
//! Queues are matched by name in this order: the user's rename table, the
//! same name in the target, then the default queue. If none of them exists
//! in the target the containing object is skipped.

use std::collections::{BTreeMap, HashMap};

use crate::error::{VaultError, VaultResult};
use crate::models::{ObjectId, ObjectSummary};

/// How a queue was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMatch {
    Renamed,
    SameName,
    Default,
}

/// A target queue chosen for a source queue name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQueue {
    pub id: ObjectId,
    pub name: String,
    pub matched: QueueMatch,
}

/// Target queue lookup with rename table and default fallback
#[derive(Debug, Clone, Default)]
pub struct QueueResolver {
    renames: HashMap<String, String>,
    targets: HashMap<String, (ObjectId, String)>,
    default: Option<(ObjectId, String)>,
}

impl QueueResolver {
    /// Index the target queues.
    ///
    /// A default queue that does not exist in the target is a usage error,
    /// reported before any object is touched.
    pub fn new(
        target_queues: &[ObjectSummary],
        renames: &BTreeMap<String, String>,
        default_queue: Option<&str>,
    ) -> VaultResult<Self> {
        let mut targets = HashMap::new();
        for queue in target_queues.iter().filter(|q| !q.name.is_empty()) {
            targets
                .entry(queue.name.to_lowercase())
                .or_insert_with(|| (queue.id.clone(), queue.name.clone()));
        }

        let default = match default_queue.map(str::trim).filter(|q| !q.is_empty()) {
            Some(name) => Some(targets.get(&name.to_lowercase()).cloned().ok_or_else(|| {
                VaultError::Validation(format!("default queue '{}' not found in target project", name))
            })?),
            None => None,
        };

        let renames = renames
            .iter()
            .map(|(from, to)| (from.trim().to_lowercase(), to.trim().to_string()))
            .collect();

        Ok(Self {
            renames,
            targets,
            default,
        })
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Resolve a source queue name; `None` source name goes straight to the
    /// default queue
    pub fn resolve(&self, source_name: Option<&str>) -> Option<ResolvedQueue> {
        let source = source_name.map(str::trim).filter(|s| !s.is_empty());

        if let Some(source) = source {
            if let Some(renamed) = self.renames.get(&source.to_lowercase()) {
                if let Some(found) = self.lookup(renamed, QueueMatch::Renamed) {
                    return Some(found);
                }
            }
            if let Some(found) = self.lookup(source, QueueMatch::SameName) {
                return Some(found);
            }
        }

        self.default.as_ref().map(|(id, name)| ResolvedQueue {
            id: id.clone(),
            name: name.clone(),
            matched: QueueMatch::Default,
        })
    }

    fn lookup(&self, name: &str, matched: QueueMatch) -> Option<ResolvedQueue> {
        self.targets
            .get(&name.to_lowercase())
            .map(|(id, name)| ResolvedQueue {
                id: id.clone(),
                name: name.clone(),
                matched,
            })
    }
}

/// Parse `Source=Target` entries into a rename table
pub fn parse_queue_map<S: AsRef<str>>(entries: &[S]) -> VaultResult<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for entry in entries {
        let entry = entry.as_ref();
        let (from, to) = entry
            .split_once('=')
            .map(|(f, t)| (f.trim(), t.trim()))
            .filter(|(f, t)| !f.is_empty() && !t.is_empty())
            .ok_or_else(|| {
                VaultError::Validation(format!(
                    "invalid queue mapping '{}', expected SourceQueue=TargetQueue",
                    entry
                ))
            })?;
        map.insert(from.to_string(), to.to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceDocument;

    fn queues() -> Vec<ObjectSummary> {
        [(10, "Azure Pipelines"), (11, "Linux-Pool"), (12, "Default")]
            .into_iter()
            .map(|(id, name)| ObjectSummary {
                id: ObjectId::Number(id),
                name: name.into(),
                record: ResourceDocument::new(),
            })
            .collect()
    }

    #[test]
    fn test_rename_table_first() {
        let renames = parse_queue_map(&["Hosted Ubuntu=Linux-Pool"]).unwrap();
        let resolver = QueueResolver::new(&queues(), &renames, None).unwrap();

        let q = resolver.resolve(Some("hosted ubuntu")).unwrap();
        assert_eq!(q.id, ObjectId::Number(11));
        assert_eq!(q.matched, QueueMatch::Renamed);
    }

    #[test]
    fn test_same_name_then_default() {
        let resolver = QueueResolver::new(&queues(), &BTreeMap::new(), Some("default")).unwrap();

        let same = resolver.resolve(Some("azure pipelines")).unwrap();
        assert_eq!(same.matched, QueueMatch::SameName);
        assert_eq!(same.name, "Azure Pipelines");

        let fallback = resolver.resolve(Some("Windows-Pool")).unwrap();
        assert_eq!(fallback.id, ObjectId::Number(12));
        assert_eq!(fallback.matched, QueueMatch::Default);
    }

    #[test]
    fn test_unresolvable_without_default() {
        let resolver = QueueResolver::new(&queues(), &BTreeMap::new(), None).unwrap();
        assert!(resolver.resolve(Some("Windows-Pool")).is_none());
        assert!(resolver.resolve(None).is_none());
    }

    #[test]
    fn test_missing_default_queue_is_error() {
        let err = QueueResolver::new(&queues(), &BTreeMap::new(), Some("Nope")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_parse_queue_map_rejects_garbage() {
        assert!(parse_queue_map(&["NoEquals"]).is_err());
        assert!(parse_queue_map(&["=Target"]).is_err());
        let map = parse_queue_map(&[" A = B "]).unwrap();
        assert_eq!(map.get("A").map(String::as_str), Some("B"));
    }
}
