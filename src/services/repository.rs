//! Repository references embedded in pipelines
//!
//! Build definitions and YAML pipelines carry `{ id, name }` repository
//! objects. The id wins when present, but only through the source listing:
//! an id the source no longer knows is never trusted, even if the embedded
//! name happens to exist in the target.

use serde_json::{Map, Value};

use crate::api::ResourceApi;
use crate::error::ApiResult;
use crate::models::{ObjectId, ResourceKind, Scope};
use crate::resolve::{ReferenceMap, Unresolved};

/// A repository resolved in the target scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRepository {
    pub id: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct RepositoryResolver {
    map: ReferenceMap,
}

impl RepositoryResolver {
    pub fn build(api: &dyn ResourceApi, source: &Scope, target: &Scope) -> ApiResult<Self> {
        Ok(Self {
            map: ReferenceMap::build(api, ResourceKind::Repository, source, target)?,
        })
    }

    pub fn from_map(map: ReferenceMap) -> Self {
        Self { map }
    }

    pub fn map(&self) -> &ReferenceMap {
        &self.map
    }

    /// Resolve a source `{ id, name }` repository reference
    pub fn resolve(&self, id: Option<&ObjectId>, name: Option<&str>) -> Result<TargetRepository, Unresolved> {
        let name = match id {
            Some(id) => self.map.source_name(id).ok_or_else(|| {
                Unresolved::new(
                    ResourceKind::Repository,
                    name.map(str::to_string).unwrap_or_else(|| id.to_string()),
                    "is not in the source scope listing",
                )
            })?,
            None => name
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| Unresolved::new(ResourceKind::Repository, "(none)", "has neither id nor name"))?,
        };

        let target_id = self
            .map
            .target_id(name)
            .ok_or_else(|| Unresolved::new(ResourceKind::Repository, name, "has no match in the target scope"))?;

        Ok(TargetRepository {
            id: target_id.clone(),
            name: self.map.target_name(target_id).unwrap_or(name).to_string(),
        })
    }

    /// Resolve a repository object in place, rewriting its id and name
    pub fn rewrite(&self, repository: &mut Map<String, Value>) -> Result<TargetRepository, Unresolved> {
        let id = repository.get("id").and_then(ObjectId::from_value);
        let name = [
            repository.get("name"),
            repository.get("fullName"),
            repository.get("properties").and_then(|p| p.get("repositoryName")),
        ]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|n| !n.trim().is_empty());

        let resolved = self.resolve(id.as_ref(), name)?;
        repository.insert("id".into(), resolved.id.to_value());
        repository.insert("name".into(), Value::String(resolved.name.clone()));
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObjectSummary, ResourceDocument};
    use serde_json::json;

    fn repo(id: &str, name: &str) -> ObjectSummary {
        ObjectSummary {
            id: ObjectId::from(id),
            name: name.to_string(),
            record: ResourceDocument::new(),
        }
    }

    fn resolver() -> RepositoryResolver {
        RepositoryResolver::from_map(ReferenceMap::from_listings(
            ResourceKind::Repository,
            &[repo("src-a", "App"), repo("src-b", "Lib")],
            &[repo("dst-a", "app")],
        ))
    }

    #[test]
    fn test_resolves_through_source_listing() {
        let found = resolver().resolve(Some(&ObjectId::from("SRC-A")), Some("stale")).unwrap();
        assert_eq!(found.id, ObjectId::from("dst-a"));
        assert_eq!(found.name, "app");
    }

    #[test]
    fn test_unknown_source_id_is_unresolved_even_if_name_exists() {
        let err = resolver().resolve(Some(&ObjectId::from("gone")), Some("App")).unwrap_err();
        assert!(err.detail.contains("source scope listing"));
    }

    #[test]
    fn test_name_only_reference() {
        assert!(resolver().resolve(None, Some("APP")).is_ok());
        let err = resolver().resolve(None, Some("Lib")).unwrap_err();
        assert_eq!(err.reference, "Lib");
        assert!(resolver().resolve(None, None).is_err());
    }

    #[test]
    fn test_rewrite_in_place() {
        let mut value = json!({"id": "src-a", "name": "App", "type": "TfsGit"});
        let repo = value.as_object_mut().unwrap();
        resolver().rewrite(repo).unwrap();
        assert_eq!(value, json!({"id": "dst-a", "name": "app", "type": "TfsGit"}));
    }

    #[test]
    fn test_rewrite_falls_back_to_repository_properties() {
        let mut value = json!({"name": "", "type": "TfsGit", "properties": {"repositoryName": "App"}});
        let repo = value.as_object_mut().unwrap();
        let resolved = resolver().rewrite(repo).unwrap();
        assert_eq!(resolved.id, ObjectId::from("dst-a"));
        assert_eq!(value["name"], json!("app"));

        let mut full_name = json!({"fullName": "Lib"});
        let err = resolver().rewrite(full_name.as_object_mut().unwrap()).unwrap_err();
        assert_eq!(err.reference, "Lib");
    }
}
