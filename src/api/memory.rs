//! In-process `ResourceApi`
//!
//! Keeps objects per (scope, kind) in memory, assigns ids on create the way
//! the service does (integers or GUIDs depending on the kind), and records
//! every creation so tests can assert on exactly what was sent.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};
use uuid::Uuid;

use super::{ProjectInfo, ResourceApi};
use crate::error::{ApiError, ApiResult};
use crate::models::{ObjectId, ObjectSummary, ResourceDocument, ResourceKind, Scope};

type ScopeKey = String;

fn scope_key(scope: &Scope) -> ScopeKey {
    format!(
        "{}/{}",
        scope.org_name().to_lowercase(),
        scope.project.to_lowercase()
    )
}

fn org_key(scope: &Scope) -> String {
    scope.org_name().to_lowercase()
}

/// Single-threaded fake of the Azure DevOps API
#[derive(Debug)]
pub struct InMemoryApi {
    objects: RefCell<HashMap<(ScopeKey, ResourceKind), Vec<ResourceDocument>>>,
    identities: RefCell<HashMap<String, Vec<ResourceDocument>>>,
    packages: RefCell<HashMap<(ScopeKey, String), Vec<ResourceDocument>>>,
    rejected_names: RefCell<HashSet<String>>,
    failing_gets: RefCell<HashSet<String>>,
    created: RefCell<Vec<(ScopeKey, ResourceKind, ResourceDocument)>>,
    next_id: Cell<i64>,
}

impl Default for InMemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self {
            objects: RefCell::new(HashMap::new()),
            identities: RefCell::new(HashMap::new()),
            packages: RefCell::new(HashMap::new()),
            rejected_names: RefCell::new(HashSet::new()),
            failing_gets: RefCell::new(HashSet::new()),
            created: RefCell::new(Vec::new()),
            next_id: Cell::new(1000),
        }
    }

    fn assign_id(&self, kind: ResourceKind) -> ObjectId {
        if kind.uses_numeric_ids() {
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            ObjectId::Number(id)
        } else {
            ObjectId::Text(Uuid::new_v4().to_string())
        }
    }

    fn store(&self, scope: &Scope, kind: ResourceKind, mut doc: ResourceDocument) -> ResourceDocument {
        if doc.id().is_none() {
            doc.insert("id", self.assign_id(kind).to_value());
        }
        self.objects
            .borrow_mut()
            .entry((scope_key(scope), kind))
            .or_default()
            .push(doc.clone());
        doc
    }

    /// Add an existing object to a scope; missing ids are assigned
    pub fn seed(&self, scope: &Scope, kind: ResourceKind, value: Value) -> ObjectId {
        let doc = ResourceDocument::from_value(value).unwrap_or_default();
        let stored = self.store(scope, kind, doc);
        stored.id().unwrap_or(ObjectId::Number(0))
    }

    /// Add an identity to the scope's organization
    pub fn seed_identity(&self, scope: &Scope, value: Value) -> ObjectId {
        let mut doc = ResourceDocument::from_value(value).unwrap_or_default();
        if doc.id().is_none() {
            doc.insert("id", Value::String(Uuid::new_v4().to_string()));
        }
        let id = doc.id().unwrap_or(ObjectId::Number(0));
        self.identities
            .borrow_mut()
            .entry(org_key(scope))
            .or_default()
            .push(doc);
        id
    }

    /// Add a package to a feed. Its versions travel inline under
    /// `versions`, the way the service returns them.
    pub fn seed_package(&self, scope: &Scope, feed: &ObjectId, value: Value) -> ObjectId {
        let mut doc = ResourceDocument::from_value(value).unwrap_or_default();
        if doc.id().is_none() {
            doc.insert("id", Value::String(Uuid::new_v4().to_string()));
        }
        let id = doc.id().unwrap_or(ObjectId::Number(0));
        self.packages
            .borrow_mut()
            .entry((scope_key(scope), feed.key()))
            .or_default()
            .push(doc);
        id
    }

    fn feed_packages(&self, scope: &Scope, feed: &ObjectId) -> ApiResult<Vec<ResourceDocument>> {
        let known = self
            .objects(scope, ResourceKind::Feed)
            .iter()
            .any(|f| f.id().map(|i| i.key()) == Some(feed.key()));
        if !known {
            return Err(ApiError::not_found(ResourceKind::Feed, feed.to_string()));
        }
        Ok(self
            .packages
            .borrow()
            .get(&(scope_key(scope), feed.key()))
            .cloned()
            .unwrap_or_default())
    }

    /// Make every create of an object with this name fail as rejected
    pub fn reject_create(&self, name: &str) {
        self.rejected_names.borrow_mut().insert(name.to_string());
    }

    /// Make `get` of this id fail with a transport error
    pub fn fail_get(&self, id: &ObjectId) {
        self.failing_gets.borrow_mut().insert(id.key());
    }

    /// Objects currently present in a scope
    pub fn objects(&self, scope: &Scope, kind: ResourceKind) -> Vec<ResourceDocument> {
        self.objects
            .borrow()
            .get(&(scope_key(scope), kind))
            .cloned()
            .unwrap_or_default()
    }

    /// Payloads accepted by `create`, in call order
    pub fn created(&self, scope: &Scope, kind: ResourceKind) -> Vec<ResourceDocument> {
        let key = scope_key(scope);
        self.created
            .borrow()
            .iter()
            .filter(|(k, c, _)| *k == key && *c == kind)
            .map(|(_, _, doc)| doc.clone())
            .collect()
    }

    /// Project wikis are backed by a hidden repository the service creates
    fn provision_wiki_repository(&self, scope: &Scope, doc: &mut ResourceDocument) {
        let is_project_wiki = doc.str_at("/type") == Some("projectWiki");
        if !is_project_wiki || doc.contains_key("repositoryId") {
            return;
        }
        let name = format!("{}.wiki", doc.name().unwrap_or("wiki"));
        let remote = format!(
            "https://dev.azure.com/{}/{}/_git/{}",
            scope.org_name(),
            scope.project,
            name
        );
        let repo_id = self.seed(
            scope,
            ResourceKind::Repository,
            json!({ "name": name, "remoteUrl": remote, "isDisabled": true }),
        );
        doc.insert("repositoryId", repo_id.to_value());
    }
}

impl ResourceApi for InMemoryApi {
    fn list(&self, scope: &Scope, kind: ResourceKind) -> ApiResult<Vec<ObjectSummary>> {
        Ok(self
            .objects(scope, kind)
            .into_iter()
            .filter(|doc| {
                kind != ResourceKind::Repository
                    || !doc.get("isDisabled").and_then(Value::as_bool).unwrap_or(false)
            })
            .filter_map(|doc| ObjectSummary::from_record(kind, doc))
            .collect())
    }

    fn get(&self, scope: &Scope, kind: ResourceKind, id: &ObjectId) -> ApiResult<ResourceDocument> {
        if self.failing_gets.borrow().contains(&id.key()) {
            return Err(ApiError::Transport(format!("connection reset fetching {}", id)));
        }

        let found = if kind == ResourceKind::Identity {
            self.identities
                .borrow()
                .get(&org_key(scope))
                .and_then(|ids| ids.iter().find(|d| d.id().map(|i| i.key()) == Some(id.key())).cloned())
        } else {
            self.objects(scope, kind)
                .into_iter()
                .find(|d| d.id().map(|i| i.key()) == Some(id.key()))
        };
        found.ok_or_else(|| ApiError::not_found(kind, id.to_string()))
    }

    fn create(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        payload: &ResourceDocument,
    ) -> ApiResult<ResourceDocument> {
        if let Some(name) = payload.name() {
            if self.rejected_names.borrow().contains(name) {
                return Err(ApiError::Rejected(format!("{} '{}' was refused", kind, name)));
            }
        }

        self.created
            .borrow_mut()
            .push((scope_key(scope), kind, payload.clone()));

        let mut doc = payload.clone();
        doc.remove("id");
        if kind == ResourceKind::Wiki {
            self.provision_wiki_repository(scope, &mut doc);
        }
        Ok(self.store(scope, kind, doc))
    }

    fn search_identities(&self, scope: &Scope, query: &str) -> ApiResult<Vec<ResourceDocument>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let fields = ["uniqueName", "displayName", "mailAddress", "providerDisplayName"];
        Ok(self
            .identities
            .borrow()
            .get(&org_key(scope))
            .map(|ids| {
                ids.iter()
                    .filter(|d| {
                        fields.iter().any(|f| {
                            d.str_at(&format!("/{}", f))
                                .is_some_and(|v| v.to_lowercase().contains(&needle))
                        })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn project(&self, scope: &Scope) -> ApiResult<ProjectInfo> {
        Ok(ProjectInfo {
            id: format!("{}-id", scope.project.to_lowercase().replace(' ', "-")),
            name: scope.project.clone(),
        })
    }

    fn list_packages(
        &self,
        scope: &Scope,
        feed: &ObjectId,
        protocol: Option<&str>,
    ) -> ApiResult<Vec<ResourceDocument>> {
        let protocol = protocol.map(str::trim).filter(|p| !p.is_empty());
        Ok(self
            .feed_packages(scope, feed)?
            .into_iter()
            .filter(|p| match protocol {
                Some(wanted) => p
                    .str_at("/protocolType")
                    .is_some_and(|t| t.eq_ignore_ascii_case(wanted)),
                None => true,
            })
            .collect())
    }

    fn list_package_versions(
        &self,
        scope: &Scope,
        feed: &ObjectId,
        package: &ObjectId,
    ) -> ApiResult<Vec<ResourceDocument>> {
        let found = self
            .feed_packages(scope, feed)?
            .into_iter()
            .find(|p| p.id().map(|i| i.key()) == Some(package.key()))
            .ok_or_else(|| ApiError::not_found(ResourceKind::Feed, package.to_string()))?;
        Ok(match found.get("versions") {
            Some(Value::Array(versions)) => versions
                .iter()
                .cloned()
                .filter_map(|v| ResourceDocument::from_value(v).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("https://dev.azure.com/contoso", "Web")
    }

    #[test]
    fn test_seed_and_list() {
        let api = InMemoryApi::new();
        let id = api.seed(&scope(), ResourceKind::Repository, json!({"id": "r1", "name": "A"}));
        assert_eq!(id, ObjectId::from("r1"));

        let listed = api.list(&scope(), ResourceKind::Repository).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "A");

        let other = Scope::new("https://dev.azure.com/contoso", "Api");
        assert!(api.list(&other, ResourceKind::Repository).unwrap().is_empty());
    }

    #[test]
    fn test_create_assigns_ids_per_kind() {
        let api = InMemoryApi::new();
        let payload = ResourceDocument::from_value(json!({"name": "CI"})).unwrap();

        let build = api.create(&scope(), ResourceKind::BuildDefinition, &payload).unwrap();
        assert!(matches!(build.id(), Some(ObjectId::Number(_))));

        let endpoint = api.create(&scope(), ResourceKind::ServiceConnection, &payload).unwrap();
        assert!(matches!(endpoint.id(), Some(ObjectId::Text(_))));

        assert_eq!(api.created(&scope(), ResourceKind::BuildDefinition).len(), 1);
    }

    #[test]
    fn test_rejected_create() {
        let api = InMemoryApi::new();
        api.reject_create("Bad");
        let payload = ResourceDocument::from_value(json!({"name": "Bad"})).unwrap();
        let err = api.create(&scope(), ResourceKind::Feed, &payload).unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
        assert!(api.objects(&scope(), ResourceKind::Feed).is_empty());
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let api = InMemoryApi::new();
        let err = api
            .get(&scope(), ResourceKind::BuildDefinition, &ObjectId::Number(1))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_identity_search_is_org_wide() {
        let api = InMemoryApi::new();
        api.seed_identity(&scope(), json!({"id": "u", "uniqueName": "u1@contoso.com"}));

        let other_project = Scope::new("https://dev.azure.com/contoso", "Api");
        let hits = api.search_identities(&other_project, "U1@contoso.com").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(api
            .get(&other_project, ResourceKind::Identity, &ObjectId::from("u"))
            .is_ok());
    }

    #[test]
    fn test_project_wiki_gets_backing_repository() {
        let api = InMemoryApi::new();
        let payload =
            ResourceDocument::from_value(json!({"name": "Docs", "type": "projectWiki"})).unwrap();
        let wiki = api.create(&scope(), ResourceKind::Wiki, &payload).unwrap();
        let repo_id = wiki.get("repositoryId").and_then(ObjectId::from_value).unwrap();

        let repo = api.get(&scope(), ResourceKind::Repository, &repo_id).unwrap();
        assert_eq!(repo.name(), Some("Docs.wiki"));
        assert!(api.list(&scope(), ResourceKind::Repository).unwrap().is_empty());
    }
}
