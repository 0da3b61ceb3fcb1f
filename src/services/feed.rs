//! Artifacts feeds
//!
//! Only the feed definition is migrated; packages are not. The package and
//! version lookups below show what a feed holds, and so what a restore of
//! it leaves behind.

use serde_json::{Map, Value};

use super::NameIndex;
use crate::api::ResourceApi;
use crate::backup::{RestoreContext, RestoreHandler};
use crate::error::{VaultError, VaultResult};
use crate::models::{ObjectSummary, ResourceDocument, ResourceKind, Scope};
use crate::resolve::Unresolved;
use crate::storage::Snapshot;

/// Server-side state on each upstream source
const UPSTREAM_SERVER_FIELDS: &[&str] = &["id", "status", "statusMessage", "deletedDate"];

pub struct FeedRestore {
    index: NameIndex,
}

impl FeedRestore {
    pub fn prepare(ctx: &RestoreContext<'_>) -> VaultResult<Self> {
        Ok(Self {
            index: NameIndex::load(ctx.api, ResourceKind::Feed, &ctx.target)?,
        })
    }
}

impl RestoreHandler for FeedRestore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Feed
    }

    fn find_existing(&self, _snapshot: &Snapshot, payload: &ResourceDocument) -> Option<String> {
        self.index.find(payload)
    }

    fn resolve(
        &self,
        _ctx: &RestoreContext<'_>,
        snapshot: &Snapshot,
        payload: &mut ResourceDocument,
        _warnings: &mut Vec<String>,
    ) -> Result<(), Unresolved> {
        let mut rebuilt = Map::new();
        rebuilt.insert("name".into(), Value::String(snapshot.label()));
        if let Some(description) = payload.str_at("/description") {
            rebuilt.insert("description".into(), Value::String(description.to_string()));
        }
        let upstream_enabled = payload
            .get("upstreamEnabled")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        rebuilt.insert("upstreamEnabled".into(), Value::Bool(upstream_enabled));

        if let Some(Value::Array(sources)) = payload.get("upstreamSources") {
            let sources: Vec<Value> = sources
                .iter()
                .cloned()
                .map(|mut source| {
                    if let Some(fields) = source.as_object_mut() {
                        for field in UPSTREAM_SERVER_FIELDS {
                            fields.shift_remove(*field);
                        }
                    }
                    source
                })
                .collect();
            rebuilt.insert("upstreamSources".into(), Value::Array(sources));
        }

        *payload = ResourceDocument::from(rebuilt);
        Ok(())
    }

    fn record_created(&mut self, payload: &ResourceDocument, created: &ResourceDocument) {
        self.index.record(payload, created);
    }
}

// === Contents ===

/// Look a feed up by name (any case) or id
pub fn find_feed(api: &dyn ResourceApi, scope: &Scope, feed: &str) -> VaultResult<ObjectSummary> {
    let wanted = feed.trim();
    api.list(scope, ResourceKind::Feed)?
        .into_iter()
        .find(|f| f.name.eq_ignore_ascii_case(wanted) || f.id.key() == wanted.to_lowercase())
        .ok_or_else(|| VaultError::NotFound {
            entity_type: "Feed",
            identifier: wanted.to_string(),
        })
}

/// Look a package up by name, normalized name or id, ignoring case
pub fn find_package<'a>(packages: &'a [ResourceDocument], package: &str) -> VaultResult<&'a ResourceDocument> {
    let wanted = package.trim();
    packages
        .iter()
        .find(|p| {
            let named = ["/name", "/normalizedName"]
                .iter()
                .filter_map(|ptr| p.str_at(ptr))
                .any(|n| n.eq_ignore_ascii_case(wanted));
            named || p.id().is_some_and(|id| id.key() == wanted.to_lowercase())
        })
        .ok_or_else(|| VaultError::NotFound {
            entity_type: "Package",
            identifier: wanted.to_string(),
        })
}

/// Packages in a feed
pub fn feed_packages(
    api: &dyn ResourceApi,
    scope: &Scope,
    feed: &str,
    protocol: Option<&str>,
) -> VaultResult<(ObjectSummary, Vec<ResourceDocument>)> {
    let feed = find_feed(api, scope, feed)?;
    let packages = api.list_packages(scope, &feed.id, protocol)?;
    Ok((feed, packages))
}

/// Versions of one package in a feed, with the package's display name
pub fn package_versions(
    api: &dyn ResourceApi,
    scope: &Scope,
    feed: &str,
    package: &str,
) -> VaultResult<(String, Vec<ResourceDocument>)> {
    let (feed, packages) = feed_packages(api, scope, feed, None)?;
    let found = find_package(&packages, package)?;
    let id = found.id().ok_or_else(|| {
        VaultError::Validation(format!("package '{}' in feed '{}' has no id", package, feed.name))
    })?;
    let name = found.name().unwrap_or(package).to_string();
    let versions = api.list_package_versions(scope, &feed.id, &id)?;
    Ok((name, versions))
}
