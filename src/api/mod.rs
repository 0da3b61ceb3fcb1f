//! Backing API collaborator
//!
//! The engine never talks HTTP itself. It sees the service through
//! [`ResourceApi`]: list a kind in a scope, fetch one object, create one
//! object, plus the lookups that have no kind of their own (identity search,
//! project info and feed contents). [`AzCliApi`] drives the real service through `az rest`;
//! [`InMemoryApi`] is the in-process double the orchestrator tests run on.

pub mod az;
pub mod memory;

pub use az::AzCliApi;
pub use memory::InMemoryApi;

use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::models::{ObjectId, ObjectSummary, ResourceDocument, ResourceKind, Scope};

/// Project reference used when rebuilding project-scoped payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    pub name: String,
}

/// Everything the orchestrators need from the service
pub trait ResourceApi {
    /// Every existing object of `kind` in `scope`
    fn list(&self, scope: &Scope, kind: ResourceKind) -> ApiResult<Vec<ObjectSummary>>;

    /// Full detail of one object
    fn get(&self, scope: &Scope, kind: ResourceKind, id: &ObjectId) -> ApiResult<ResourceDocument>;

    /// Create an object from a sanitized payload, returning the server's copy
    fn create(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        payload: &ResourceDocument,
    ) -> ApiResult<ResourceDocument>;

    /// Identities in the scope's organization matching a login or display name
    fn search_identities(&self, scope: &Scope, query: &str) -> ApiResult<Vec<ResourceDocument>>;

    /// Id and canonical name of the scope's project
    fn project(&self, scope: &Scope) -> ApiResult<ProjectInfo>;

    /// Packages held by a feed, optionally only those of one protocol
    /// (`npm`, `nuget`, `maven`, `pypi`, ...)
    fn list_packages(
        &self,
        scope: &Scope,
        feed: &ObjectId,
        protocol: Option<&str>,
    ) -> ApiResult<Vec<ResourceDocument>>;

    /// Published versions of one package
    fn list_package_versions(
        &self,
        scope: &Scope,
        feed: &ObjectId,
        package: &ObjectId,
    ) -> ApiResult<Vec<ResourceDocument>>;
}
