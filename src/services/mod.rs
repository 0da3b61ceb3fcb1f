//! Per-kind backup and restore behavior
//!
//! Each resource kind gets a backup handler (what to fetch, which hints to
//! capture) and a restore handler (which references to translate, how to
//! recognise an existing equivalent). Restore handlers are prepared once per
//! run: every listing they need is fetched before the first object.

pub mod branch_policy;
pub mod build_definition;
pub mod feed;
pub mod release_definition;
pub mod repository;
pub mod service_connection;
pub mod task_group;
pub mod variable_group;
pub mod wiki;
pub mod yaml_pipeline;

use serde_json::{Map, Value};

use crate::api::{ProjectInfo, ResourceApi};
use crate::backup::{
    BackupContext, BackupHandler, BackupManager, RestoreContext, RestoreHandler, RestoreManager, RunReport,
};
use crate::error::{ApiResult, VaultError, VaultResult};
use crate::models::{ObjectId, ObjectSummary, ResourceDocument, ResourceKind, Scope, SelectionSet};
use crate::resolve::{remap_inputs, remap_task_reference, MissPolicy, ReferenceMap};
use crate::signature::find_by_name;
use crate::storage::Snapshot;

/// Backup handler for a snapshot kind
pub fn backup_handler(kind: ResourceKind) -> VaultResult<Box<dyn BackupHandler>> {
    let handler: Box<dyn BackupHandler> = match kind {
        ResourceKind::BranchPolicy => Box::new(branch_policy::BranchPolicyBackup),
        ResourceKind::BuildDefinition => Box::new(PlainBackup(kind)),
        ResourceKind::ReleaseDefinition => Box::new(PlainBackup(kind)),
        ResourceKind::YamlPipeline => Box::new(yaml_pipeline::YamlPipelineBackup),
        ResourceKind::ServiceConnection => Box::new(PlainBackup(kind)),
        ResourceKind::TaskGroup => Box::new(ListingBackup(kind)),
        ResourceKind::VariableGroup => Box::new(PlainBackup(kind)),
        ResourceKind::Wiki => Box::new(wiki::WikiBackup),
        ResourceKind::Feed => Box::new(PlainBackup(kind)),
        other => return Err(not_a_snapshot_kind(other)),
    };
    Ok(handler)
}

/// Restore handler for a snapshot kind, with its reference maps built
pub fn restore_handler(
    kind: ResourceKind,
    ctx: &RestoreContext<'_>,
    snapshots: &[Snapshot],
) -> VaultResult<Box<dyn RestoreHandler>> {
    let handler: Box<dyn RestoreHandler> = match kind {
        ResourceKind::BranchPolicy => Box::new(branch_policy::BranchPolicyRestore::prepare(ctx, snapshots)?),
        ResourceKind::BuildDefinition => Box::new(build_definition::BuildDefinitionRestore::prepare(ctx)?),
        ResourceKind::ReleaseDefinition => Box::new(release_definition::ReleaseDefinitionRestore::prepare(ctx)?),
        ResourceKind::YamlPipeline => Box::new(yaml_pipeline::YamlPipelineRestore::prepare(ctx)?),
        ResourceKind::ServiceConnection => Box::new(service_connection::ServiceConnectionRestore::prepare(ctx)?),
        ResourceKind::TaskGroup => Box::new(task_group::TaskGroupRestore::prepare(ctx)?),
        ResourceKind::VariableGroup => Box::new(variable_group::VariableGroupRestore::prepare(ctx)?),
        ResourceKind::Wiki => Box::new(wiki::WikiRestore::prepare(ctx)?),
        ResourceKind::Feed => Box::new(feed::FeedRestore::prepare(ctx)?),
        other => return Err(not_a_snapshot_kind(other)),
    };
    Ok(handler)
}

/// Back up the selected objects of one kind
pub fn backup(manager: &BackupManager<'_>, kind: ResourceKind, selection: &SelectionSet) -> VaultResult<RunReport> {
    let handler = backup_handler(kind)?;
    manager.run(handler.as_ref(), selection)
}

/// Restore the selected snapshots of one kind.
///
/// Snapshots are loaded and the handler prepared before anything is
/// created, so every run-level failure happens without side effects.
pub fn restore(manager: &RestoreManager<'_>, kind: ResourceKind, selection: &SelectionSet) -> VaultResult<RunReport> {
    let snapshots = manager.load(kind, selection)?;
    let mut handler = restore_handler(kind, manager.context(), &snapshots)?;
    Ok(manager.run(handler.as_mut(), &snapshots))
}

fn not_a_snapshot_kind(kind: ResourceKind) -> VaultError {
    VaultError::Validation(format!("{} objects are not backed up or restored", kind))
}

// === Shared handlers ===

/// Full detail fetched per listed object
struct PlainBackup(ResourceKind);

impl BackupHandler for PlainBackup {
    fn kind(&self) -> ResourceKind {
        self.0
    }
}

/// The listing record is already the full object
struct ListingBackup(ResourceKind);

impl BackupHandler for ListingBackup {
    fn kind(&self) -> ResourceKind {
        self.0
    }

    fn fetch(
        &self,
        _ctx: &BackupContext<'_>,
        summary: &ObjectSummary,
    ) -> ApiResult<Option<ResourceDocument>> {
        Ok(Some(summary.record.clone()))
    }
}

// === Shared restore state ===

/// Target objects of a named kind, extended with what the run creates
#[derive(Debug, Clone)]
pub struct NameIndex {
    kind: ResourceKind,
    existing: Vec<ObjectSummary>,
}

impl NameIndex {
    pub fn load(api: &dyn ResourceApi, kind: ResourceKind, target: &Scope) -> ApiResult<Self> {
        Ok(Self {
            kind,
            existing: api.list(target, kind)?,
        })
    }

    /// Name of the target object with the payload's name, if any
    pub fn find(&self, payload: &ResourceDocument) -> Option<String> {
        let name = payload.name()?;
        find_by_name(name, &self.existing).map(|found| found.name.clone())
    }

    pub fn record(&mut self, payload: &ResourceDocument, created: &ResourceDocument) {
        self.existing.push(created_summary(self.kind, payload, created));
    }
}

/// Summary of a freshly created object. The server copy is preferred; the
/// payload stands in when the response carries no id.
pub fn created_summary(kind: ResourceKind, payload: &ResourceDocument, created: &ResourceDocument) -> ObjectSummary {
    ObjectSummary::from_record(kind, created.clone()).unwrap_or_else(|| ObjectSummary {
        id: ObjectId::Text(String::new()),
        name: payload.name().unwrap_or_default().to_string(),
        record: payload.clone(),
    })
}

/// Task group and service connection maps used by pipeline steps
#[derive(Debug, Clone)]
pub struct StepReferences {
    task_groups: ReferenceMap,
    endpoints: ReferenceMap,
}

impl StepReferences {
    pub fn build(api: &dyn ResourceApi, source: &Scope, target: &Scope) -> ApiResult<Self> {
        Ok(Self {
            task_groups: ReferenceMap::build(api, ResourceKind::TaskGroup, source, target)?,
            endpoints: ReferenceMap::build(api, ResourceKind::ServiceConnection, source, target)?,
        })
    }

    pub fn endpoints(&self) -> &ReferenceMap {
        &self.endpoints
    }

    pub fn task_groups(&self) -> &ReferenceMap {
        &self.task_groups
    }

    /// Build step: `{ task: { id }, inputs: {...} }`
    pub fn remap_build_step(&self, step: &mut Map<String, Value>) {
        if let Some(task) = step.get_mut("task").and_then(Value::as_object_mut) {
            remap_task_reference(task, &self.task_groups);
        }
        if let Some(inputs) = step.get_mut("inputs").and_then(Value::as_object_mut) {
            remap_inputs(inputs, &self.endpoints, false);
        }
    }

    /// Release workflow task: `{ taskId, inputs: {...} }`
    pub fn remap_workflow_task(&self, task: &mut Map<String, Value>) {
        if let Some(task_id) = task.get_mut("taskId") {
            // Built-in tasks are not task groups and keep their id
            let _ = self.task_groups.remap_value(task_id, MissPolicy::KeepStale);
        }
        if let Some(inputs) = task.get_mut("inputs").and_then(Value::as_object_mut) {
            remap_inputs(inputs, &self.endpoints, false);
        }
    }
}

/// `{ projectReference: { id, name }, name, description }` for the target
pub fn project_reference(project: &ProjectInfo, payload: &ResourceDocument) -> Value {
    serde_json::json!([{
        "projectReference": { "id": project.id, "name": project.name },
        "name": payload.name().unwrap_or_default(),
        "description": payload.get("description").and_then(Value::as_str).unwrap_or_default(),
    }])
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the per-kind tests

    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::api::InMemoryApi;
    use crate::backup::RestoreOptions;
    use crate::storage::SnapshotStore;
    use crate::vcs::Mirror;

    pub fn source() -> Scope {
        Scope::new("https://dev.azure.com/contoso", "Web")
    }

    pub fn target() -> Scope {
        Scope::new("https://dev.azure.com/fabrikam", "Web Next")
    }

    /// Mirror that records calls and creates the clone directory
    #[derive(Default)]
    pub struct RecordingMirror {
        pub clones: RefCell<Vec<(String, PathBuf)>>,
        pub pushes: RefCell<Vec<(PathBuf, String)>>,
    }

    impl Mirror for RecordingMirror {
        fn mirror_clone(&self, remote_url: &str, local_path: &Path) -> VaultResult<()> {
            fs::create_dir_all(local_path)?;
            self.clones
                .borrow_mut()
                .push((remote_url.to_string(), local_path.to_path_buf()));
            Ok(())
        }

        fn mirror_push(&self, local_path: &Path, remote_url: &str) -> VaultResult<()> {
            self.pushes
                .borrow_mut()
                .push((local_path.to_path_buf(), remote_url.to_string()));
            Ok(())
        }
    }

    pub fn snapshot_root(base: &Path) -> PathBuf {
        base.join("contoso").join("Web")
    }

    pub fn run_backup(
        api: &InMemoryApi,
        mirror: &RecordingMirror,
        base: &Path,
        kind: ResourceKind,
        selection: &SelectionSet,
    ) -> VaultResult<RunReport> {
        let manager = BackupManager::new(BackupContext {
            api,
            mirror,
            scope: source(),
            store: SnapshotStore::new(snapshot_root(base).join(kind.dir_name())),
        });
        backup(&manager, kind, selection)
    }

    pub fn run_restore(
        api: &InMemoryApi,
        mirror: &RecordingMirror,
        base: &Path,
        kind: ResourceKind,
        options: RestoreOptions,
    ) -> VaultResult<RunReport> {
        let manager = RestoreManager::new(RestoreContext {
            api,
            mirror,
            source: source(),
            target: target(),
            snapshot_root: snapshot_root(base),
            options,
        });
        restore(&manager, kind, &SelectionSet::All)
    }

    /// Write a snapshot straight to the backup directory
    pub fn write_snapshot(base: &Path, kind: ResourceKind, filename: &str, value: Value) {
        let doc = ResourceDocument::from_value(value).unwrap();
        SnapshotStore::new(snapshot_root(base).join(kind.dir_name()))
            .write(filename, &doc)
            .unwrap();
    }
}
