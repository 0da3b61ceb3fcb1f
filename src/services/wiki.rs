//! Wikis
//!
//! A code wiki is a view onto a branch of an ordinary repository and only
//! needs that repository mapped. A project wiki owns a hidden repository;
//! its content travels as a bare mirror kept next to the snapshot.

use std::path::PathBuf;

use serde_json::{json, Map, Value};
use tracing::info;

use super::NameIndex;
use crate::api::{ProjectInfo, ResourceApi};
use crate::backup::{BackupContext, BackupHandler, RestoreContext, RestoreHandler};
use crate::error::{ApiResult, VaultResult};
use crate::models::{ObjectId, ObjectSummary, ResourceDocument, ResourceKind, Scope};
use crate::resolve::{MissPolicy, ReferenceMap, Unresolved};
use crate::storage::{sanitize_filename, Snapshot};

const PROJECT_WIKI: &str = "projectWiki";
const CODE_WIKI: &str = "codeWiki";

/// `{name}.wiki.git` next to the wiki's snapshot
fn mirror_dir(dir: &std::path::Path, name: &str) -> PathBuf {
    dir.join(format!("{}.wiki.git", sanitize_filename(name)))
}

fn is_project_wiki(document: &ResourceDocument) -> bool {
    document.str_at("/type") == Some(PROJECT_WIKI)
}

/// Clone URL of the repository behind a wiki
fn backing_remote(api: &dyn ResourceApi, scope: &Scope, wiki: &ResourceDocument) -> Result<String, String> {
    if let Some(remote) = wiki.str_at("/remoteUrl") {
        return Ok(remote.to_string());
    }
    let repo_id = wiki
        .get("repositoryId")
        .and_then(ObjectId::from_value)
        .ok_or_else(|| "wiki has no backing repository".to_string())?;
    let repo = api
        .get(scope, ResourceKind::Repository, &repo_id)
        .map_err(|e| e.to_string())?;
    repo.str_at("/remoteUrl")
        .map(str::to_string)
        .ok_or_else(|| format!("repository {} has no remote URL", repo_id))
}

// === Backup ===

pub struct WikiBackup;

impl BackupHandler for WikiBackup {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Wiki
    }

    fn fetch(&self, _ctx: &BackupContext<'_>, summary: &ObjectSummary) -> ApiResult<Option<ResourceDocument>> {
        Ok(Some(summary.record.clone()))
    }

    fn after_write(&self, ctx: &BackupContext<'_>, document: &ResourceDocument, warnings: &mut Vec<String>) {
        if !is_project_wiki(document) {
            return;
        }
        let name = document.name().unwrap_or("wiki");
        let local = mirror_dir(ctx.store.dir(), name);

        let cloned = backing_remote(ctx.api, &ctx.scope, document)
            .and_then(|remote| ctx.mirror.mirror_clone(&remote, &local).map_err(|e| e.to_string()));
        match cloned {
            Ok(()) => info!(wiki = %name, path = %local.display(), "wiki content mirrored"),
            Err(e) => warnings.push(format!("wiki content not mirrored: {}", e)),
        }
    }
}

// === Restore ===

pub struct WikiRestore {
    project: ProjectInfo,
    repositories: ReferenceMap,
    index: NameIndex,
}

impl WikiRestore {
    pub fn prepare(ctx: &RestoreContext<'_>) -> VaultResult<Self> {
        Ok(Self {
            project: ctx.api.project(&ctx.target)?,
            repositories: ReferenceMap::build(ctx.api, ResourceKind::Repository, &ctx.source, &ctx.target)?,
            index: NameIndex::load(ctx.api, ResourceKind::Wiki, &ctx.target)?,
        })
    }
}

impl RestoreHandler for WikiRestore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Wiki
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
        let wiki_type = payload.str_at("/type").unwrap_or(PROJECT_WIKI).to_string();

        let mut rebuilt = Map::new();
        rebuilt.insert("name".into(), Value::String(snapshot.label()));
        rebuilt.insert("type".into(), Value::String(wiki_type.clone()));
        rebuilt.insert("projectId".into(), Value::String(self.project.id.clone()));

        if wiki_type == CODE_WIKI {
            let mut repository = payload.get("repositoryId").cloned().unwrap_or(Value::Null);
            if repository.is_null() {
                return Err(Unresolved::new(ResourceKind::Repository, "(none)", "is missing from the code wiki"));
            }
            self.repositories.remap_value(&mut repository, MissPolicy::Skip)?;
            rebuilt.insert("repositoryId".into(), repository);
            rebuilt.insert(
                "mappedPath".into(),
                Value::String(payload.str_at("/mappedPath").unwrap_or("/").to_string()),
            );
            if let Some(version) = payload.pointer("/versions/0/version").and_then(Value::as_str) {
                rebuilt.insert("version".into(), json!({ "version": version }));
            }
        }

        *payload = ResourceDocument::from(rebuilt);
        Ok(())
    }

    /// Push the mirrored content into the new project wiki
    fn after_create(
        &self,
        ctx: &RestoreContext<'_>,
        snapshot: &Snapshot,
        created: &ResourceDocument,
        warnings: &mut Vec<String>,
    ) {
        if !is_project_wiki(&snapshot.document) {
            return;
        }
        let name = snapshot.label();
        let local = mirror_dir(ctx.store(ResourceKind::Wiki).dir(), &name);
        if !local.is_dir() {
            return;
        }

        let pushed = backing_remote(ctx.api, &ctx.target, created)
            .and_then(|remote| ctx.mirror.mirror_push(&local, &remote).map_err(|e| e.to_string()));
        match pushed {
            Ok(()) => info!(wiki = %name, "wiki content pushed"),
            Err(e) => warnings.push(format!("wiki content not pushed: {}", e)),
        }
    }

    fn record_created(&mut self, payload: &ResourceDocument, created: &ResourceDocument) {
        self.index.record(payload, created);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::api::InMemoryApi;
    use crate::backup::RestoreOptions;
    use crate::models::SelectionSet;
    use tempfile::TempDir;

    fn seeded() -> InMemoryApi {
        let api = InMemoryApi::new();
        api.seed(
            &source(),
            ResourceKind::Repository,
            json!({
                "id": "src-wiki-repo",
                "name": "Web.wiki",
                "isDisabled": true,
                "remoteUrl": "https://dev.azure.com/contoso/Web/_git/Web.wiki"
            }),
        );
        api.seed(
            &source(),
            ResourceKind::Wiki,
            json!({"id": "w1", "name": "Web.wiki", "type": "projectWiki", "repositoryId": "src-wiki-repo"}),
        );
        api.seed(&source(), ResourceKind::Repository, json!({"id": "src-docs", "name": "docs"}));
        api.seed(&target(), ResourceKind::Repository, json!({"id": "dst-docs", "name": "docs"}));
        api.seed(
            &source(),
            ResourceKind::Wiki,
            json!({
                "id": "w2",
                "name": "Handbook",
                "type": "codeWiki",
                "repositoryId": "src-docs",
                "mappedPath": "/handbook",
                "versions": [{"version": "main"}]
            }),
        );
        api
    }

    #[test]
    fn test_project_wiki_content_is_mirrored_and_pushed() {
        let temp = TempDir::new().unwrap();
        let api = seeded();
        let mirror = RecordingMirror::default();

        let backup = run_backup(&api, &mirror, temp.path(), ResourceKind::Wiki, &SelectionSet::All).unwrap();
        assert_eq!(backup.saved(), 2);
        let clones = mirror.clones.borrow().clone();
        assert_eq!(clones.len(), 1);
        assert_eq!(clones[0].0, "https://dev.azure.com/contoso/Web/_git/Web.wiki");
        assert!(clones[0].1.ends_with("wikis/Web.wiki.wiki.git"));

        let report = run_restore(&api, &mirror, temp.path(), ResourceKind::Wiki, RestoreOptions::default()).unwrap();
        assert_eq!(report.created(), 2, "{:?}", report.objects);

        let pushes = mirror.pushes.borrow().clone();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].1, "https://dev.azure.com/fabrikam/Web Next/_git/Web.wiki.wiki");

        let created = api.created(&target(), ResourceKind::Wiki);
        let code = created.iter().find(|w| w.name() == Some("Handbook")).unwrap();
        assert_eq!(
            code.clone().into_value(),
            json!({
                "name": "Handbook",
                "type": "codeWiki",
                "projectId": "web-next-id",
                "repositoryId": "dst-docs",
                "mappedPath": "/handbook",
                "version": {"version": "main"}
            })
        );
    }

    #[test]
    fn test_code_wiki_without_target_repository_is_skipped() {
        let temp = TempDir::new().unwrap();
        let api = InMemoryApi::new();
        let mirror = RecordingMirror::default();
        api.seed(&source(), ResourceKind::Repository, json!({"id": "src-docs", "name": "docs"}));
        write_snapshot(
            temp.path(),
            ResourceKind::Wiki,
            "Handbook.json",
            json!({"id": "w2", "name": "Handbook", "type": "codeWiki", "repositoryId": "src-docs"}),
        );

        let report = run_restore(&api, &mirror, temp.path(), ResourceKind::Wiki, RestoreOptions::default()).unwrap();
        assert_eq!(report.skipped_unresolved(), 1);
        assert!(mirror.pushes.borrow().is_empty());
    }

    #[test]
    fn test_project_wiki_without_mirror_is_created_without_push() {
        let temp = TempDir::new().unwrap();
        let api = InMemoryApi::new();
        let mirror = RecordingMirror::default();
        write_snapshot(
            temp.path(),
            ResourceKind::Wiki,
            "Web.wiki.json",
            json!({"id": "w1", "name": "Web.wiki", "type": "projectWiki"}),
        );

        let report = run_restore(&api, &mirror, temp.path(), ResourceKind::Wiki, RestoreOptions::default()).unwrap();
        assert_eq!(report.created(), 1);
        assert_eq!(report.warnings(), 0);
        assert!(mirror.pushes.borrow().is_empty());
    }
}
