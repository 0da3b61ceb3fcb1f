//! YAML pipelines
//!
//! Only the pipeline shell is migrated: name, folder and the pointer to
//! the YAML file. Everything else lives in the repository.

use serde_json::{json, Map, Value};

use super::repository::RepositoryResolver;
use super::NameIndex;
use crate::backup::{BackupContext, BackupHandler, RestoreContext, RestoreHandler};
use crate::error::{ApiResult, VaultResult};
use crate::models::{ObjectSummary, ResourceDocument, ResourceKind};
use crate::resolve::Unresolved;
use crate::storage::Snapshot;

const DEFAULT_REPOSITORY_TYPE: &str = "azureReposGit";

pub struct YamlPipelineBackup;

impl BackupHandler for YamlPipelineBackup {
    fn kind(&self) -> ResourceKind {
        ResourceKind::YamlPipeline
    }

    /// Designer pipelines share the listing; only YAML ones are kept
    fn fetch(&self, ctx: &BackupContext<'_>, summary: &ObjectSummary) -> ApiResult<Option<ResourceDocument>> {
        let document = ctx.api.get(&ctx.scope, ResourceKind::YamlPipeline, &summary.id)?;
        let is_yaml = document
            .str_at("/configuration/type")
            .is_some_and(|t| t.eq_ignore_ascii_case("yaml"));
        Ok(is_yaml.then_some(document))
    }
}

pub struct YamlPipelineRestore {
    repositories: RepositoryResolver,
    index: NameIndex,
}

impl YamlPipelineRestore {
    pub fn prepare(ctx: &RestoreContext<'_>) -> VaultResult<Self> {
        Ok(Self {
            repositories: RepositoryResolver::build(ctx.api, &ctx.source, &ctx.target)?,
            index: NameIndex::load(ctx.api, ResourceKind::YamlPipeline, &ctx.target)?,
        })
    }
}

impl RestoreHandler for YamlPipelineRestore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::YamlPipeline
    }

    fn find_existing(&self, _snapshot: &Snapshot, payload: &ResourceDocument) -> Option<String> {
        self.index.find(payload)
    }

    /// Rebuild the create payload from scratch around the resolved repository
    fn resolve(
        &self,
        _ctx: &RestoreContext<'_>,
        snapshot: &Snapshot,
        payload: &mut ResourceDocument,
        _warnings: &mut Vec<String>,
    ) -> Result<(), Unresolved> {
        let mut repository = payload
            .pointer("/configuration/repository")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let repo_type = repository
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_REPOSITORY_TYPE)
            .to_string();
        let target = self.repositories.rewrite(&mut repository)?;

        let path = payload.str_at("/configuration/path").ok_or_else(|| {
            Unresolved::new(ResourceKind::YamlPipeline, snapshot.label(), "has no YAML file path")
        })?;

        let mut rebuilt = Map::new();
        rebuilt.insert("name".into(), Value::String(snapshot.label()));
        if let Some(folder) = payload.str_at("/folder") {
            rebuilt.insert("folder".into(), Value::String(folder.to_string()));
        }
        rebuilt.insert(
            "configuration".into(),
            json!({
                "type": "yaml",
                "path": path,
                "repository": { "type": repo_type, "id": target.id.to_value(), "name": target.name },
            }),
        );
        *payload = ResourceDocument::from(rebuilt);
        Ok(())
    }

    fn record_created(&mut self, payload: &ResourceDocument, created: &ResourceDocument) {
        self.index.record(payload, created);
    }
}
