//! Task groups

use serde_json::Value;
use tracing::debug;

use super::NameIndex;
use crate::backup::{RestoreContext, RestoreHandler};
use crate::error::VaultResult;
use crate::models::{ResourceDocument, ResourceKind};
use crate::resolve::{remap_inputs, remap_task_reference, ReferenceMap, Unresolved};
use crate::storage::Snapshot;

pub struct TaskGroupRestore {
    endpoints: ReferenceMap,
    task_groups: ReferenceMap,
    index: NameIndex,
}

impl TaskGroupRestore {
    pub fn prepare(ctx: &RestoreContext<'_>) -> VaultResult<Self> {
        Ok(Self {
            endpoints: ReferenceMap::build(ctx.api, ResourceKind::ServiceConnection, &ctx.source, &ctx.target)?,
            task_groups: ReferenceMap::build(ctx.api, ResourceKind::TaskGroup, &ctx.source, &ctx.target)?,
            index: NameIndex::load(ctx.api, ResourceKind::TaskGroup, &ctx.target)?,
        })
    }
}

impl RestoreHandler for TaskGroupRestore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::TaskGroup
    }

    fn find_existing(&self, _snapshot: &Snapshot, payload: &ResourceDocument) -> Option<String> {
        self.index.find(payload)
    }

    /// Task groups pass endpoints through their own parameter names, so any
    /// GUID-shaped input is tried against the endpoint map
    fn resolve(
        &self,
        _ctx: &RestoreContext<'_>,
        _snapshot: &Snapshot,
        payload: &mut ResourceDocument,
        _warnings: &mut Vec<String>,
    ) -> Result<(), Unresolved> {
        let Some(Value::Array(tasks)) = payload.get_mut("tasks") else {
            return Ok(());
        };
        let mut remapped = 0;
        for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
            if let Some(reference) = task.get_mut("task").and_then(Value::as_object_mut) {
                if remap_task_reference(reference, &self.task_groups) {
                    remapped += 1;
                }
            }
            if let Some(inputs) = task.get_mut("inputs").and_then(Value::as_object_mut) {
                remapped += remap_inputs(inputs, &self.endpoints, true);
            }
        }
        debug!(remapped, "task group references remapped");
        Ok(())
    }

    fn record_created(&mut self, payload: &ResourceDocument, created: &ResourceDocument) {
        self.index.record(payload, created);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::api::InMemoryApi;
    use crate::backup::RestoreOptions;
    use crate::models::{ResourceKind, SelectionSet};
    use serde_json::json;
    use tempfile::TempDir;

    const SRC_EP: &str = "aaaaaaaa-0000-0000-0000-000000000001";
    const DST_EP: &str = "bbbbbbbb-0000-0000-0000-000000000001";
    const UNKNOWN: &str = "cccccccc-0000-0000-0000-000000000001";

    #[test]
    fn test_backup_uses_listing_and_restore_remaps_guid_inputs() {
        let temp = TempDir::new().unwrap();
        let api = InMemoryApi::new();
        let mirror = RecordingMirror::default();
        api.seed(&source(), ResourceKind::ServiceConnection, json!({"id": SRC_EP, "name": "registry"}));
        api.seed(&target(), ResourceKind::ServiceConnection, json!({"id": DST_EP, "name": "Registry"}));
        api.seed(&source(), ResourceKind::TaskGroup, json!({"id": "inner-src", "name": "Login"}));
        api.seed(&target(), ResourceKind::TaskGroup, json!({"id": "inner-dst", "name": "Login"}));
        api.seed(
            &source(),
            ResourceKind::TaskGroup,
            json!({
                "id": "outer-src",
                "name": "Publish",
                "revision": 5,
                "tasks": [
                    {"task": {"id": "inner-src"}, "inputs": {"registryRef": SRC_EP, "other": UNKNOWN}},
                    {"task": {"id": "builtin"}, "inputs": {"containerRegistry": SRC_EP, "tag": "latest"}}
                ]
            }),
        );

        let backup = run_backup(&api, &mirror, temp.path(), ResourceKind::TaskGroup, &SelectionSet::parse(["Publish"]))
            .unwrap();
        assert_eq!(backup.saved(), 1);

        let report = run_restore(&api, &mirror, temp.path(), ResourceKind::TaskGroup, RestoreOptions::default())
            .unwrap();
        assert_eq!(report.created(), 1);

        let created = &api.created(&target(), ResourceKind::TaskGroup)[0];
        assert_eq!(created.pointer("/tasks/0/task/id"), Some(&json!("inner-dst")));
        assert_eq!(created.pointer("/tasks/0/inputs/registryRef"), Some(&json!(DST_EP)));
        assert_eq!(created.pointer("/tasks/0/inputs/other"), Some(&json!(UNKNOWN)));
        assert_eq!(created.pointer("/tasks/1/task/id"), Some(&json!("builtin")));
        assert_eq!(created.pointer("/tasks/1/inputs/containerRegistry"), Some(&json!(DST_EP)));
        assert_eq!(created.pointer("/tasks/1/inputs/tag"), Some(&json!("latest")));
    }
}
