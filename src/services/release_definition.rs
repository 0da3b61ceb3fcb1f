//! Classic release definitions
//!
//! Release definitions reach into almost every other kind: artifacts point
//! at repositories and build definitions, deploy phases at agent queues,
//! environments at variable groups, workflow tasks at task groups and
//! service connections.

use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;

use super::{NameIndex, StepReferences};
use crate::api::ProjectInfo;
use crate::backup::{RestoreContext, RestoreHandler};
use crate::error::VaultResult;
use crate::models::{ObjectId, ResourceDocument, ResourceKind};
use crate::resolve::{shaped_like, MissPolicy, QueueMatch, QueueResolver, ReferenceMap, Unresolved};
use crate::storage::Snapshot;

pub struct ReleaseDefinitionRestore {
    project: ProjectInfo,
    repositories: ReferenceMap,
    builds: ReferenceMap,
    source_queues: ReferenceMap,
    queues: QueueResolver,
    variable_groups: ReferenceMap,
    steps: StepReferences,
    index: NameIndex,
}

impl ReleaseDefinitionRestore {
    pub fn prepare(ctx: &RestoreContext<'_>) -> VaultResult<Self> {
        let api = ctx.api;
        let source_queues = ReferenceMap::build(api, ResourceKind::AgentQueue, &ctx.source, &ctx.target)?;
        let target_queues = api.list(&ctx.target, ResourceKind::AgentQueue)?;
        Ok(Self {
            project: api.project(&ctx.target)?,
            repositories: ReferenceMap::build(api, ResourceKind::Repository, &ctx.source, &ctx.target)?,
            builds: ReferenceMap::build(api, ResourceKind::BuildDefinition, &ctx.source, &ctx.target)?,
            source_queues,
            queues: QueueResolver::new(
                &target_queues,
                &ctx.options.queue_map,
                ctx.options.default_queue.as_deref(),
            )?,
            variable_groups: ReferenceMap::build(api, ResourceKind::VariableGroup, &ctx.source, &ctx.target)?,
            steps: StepReferences::build(api, &ctx.source, &ctx.target)?,
            index: NameIndex::load(api, ResourceKind::ReleaseDefinition, &ctx.target)?,
        })
    }

    // === Artifacts ===

    fn resolve_artifact(&self, artifact: &mut Map<String, Value>) -> Result<(), Unresolved> {
        let artifact_type = artifact
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(reference) = artifact.get_mut("definitionReference").and_then(Value::as_object_mut) else {
            return Ok(());
        };

        if let Some(project) = reference.get_mut("project").and_then(Value::as_object_mut) {
            project.insert("id".into(), Value::String(self.project.id.clone()));
            project.insert("name".into(), Value::String(self.project.name.clone()));
        }

        let (map, kind) = match artifact_type.as_str() {
            "Git" => (&self.repositories, ResourceKind::Repository),
            "Build" => (&self.builds, ResourceKind::BuildDefinition),
            _ => return Ok(()),
        };

        let definition = reference
            .get("definition")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let source_id = definition.get("id").and_then(ObjectId::from_value);
        let name = definition
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| source_id.as_ref().and_then(|id| map.source_name(id)).map(str::to_string))
            .ok_or_else(|| {
                Unresolved::new(
                    kind,
                    source_id.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "artifact has no resolvable name",
                )
            })?;

        let target_id = map
            .target_id(&name)
            .ok_or_else(|| Unresolved::new(kind, name.clone(), "has no match in the target scope"))?
            .to_string();
        let target_name = map
            .target_name(&ObjectId::from(target_id.as_str()))
            .unwrap_or(name.as_str())
            .to_string();

        reference.insert("definition".into(), json!({ "id": target_id, "name": target_name }));
        if kind == ResourceKind::BuildDefinition {
            let raw_url = reference
                .get_mut("artifactSourceDefinitionUrl")
                .and_then(|url| url.get_mut("id"));
            if let Some(Value::String(raw)) = raw_url {
                if let Some(rewritten) = rewrite_definition_url(raw, &self.project.id, &target_id) {
                    *raw = rewritten;
                }
            }
        }
        artifact.insert(
            "sourceId".into(),
            Value::String(format!("{}:{}", self.project.id, target_id)),
        );
        debug!(artifact = %artifact_type, name = %target_name, "artifact remapped");
        Ok(())
    }

    // === Environments ===

    fn resolve_queue(&self, input: &mut Map<String, Value>, warnings: &mut Vec<String>) -> Result<(), Unresolved> {
        let Some(slot) = input.get_mut("queueId") else {
            return Ok(());
        };
        let Some(source_id) = ObjectId::from_value(slot).filter(|id| id.as_i64() != Some(0)) else {
            return Ok(());
        };

        let source_name = self.source_queues.source_name(&source_id);
        let queue = self.queues.resolve(source_name).ok_or_else(|| {
            Unresolved::new(
                ResourceKind::AgentQueue,
                source_name.map(str::to_string).unwrap_or_else(|| source_id.to_string()),
                "has no match in the target project and no default queue was given",
            )
        })?;
        if queue.matched == QueueMatch::Default {
            warnings.push(format!(
                "queue '{}' not found in target; using default '{}'",
                source_name.unwrap_or("(unknown)"),
                queue.name
            ));
        }
        *slot = shaped_like(&queue.id, slot);
        Ok(())
    }

    fn drop_groups(&self, groups: Option<&mut Value>, warnings: &mut Vec<String>) -> Result<(), Unresolved> {
        if let Some(Value::Array(groups)) = groups {
            let dropped = self.variable_groups.remap_list(groups, MissPolicy::Drop)?;
            if dropped > 0 {
                warnings.push(format!("{} variable group(s) not found in target; dropped", dropped));
            }
        }
        Ok(())
    }

    fn resolve_environment(
        &self,
        environment: &mut Map<String, Value>,
        warnings: &mut Vec<String>,
    ) -> Result<(), Unresolved> {
        self.drop_groups(environment.get_mut("variableGroups"), warnings)?;

        let phases = environment
            .get_mut("deployPhases")
            .and_then(Value::as_array_mut)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object_mut);
        for phase in phases {
            if let Some(input) = phase.get_mut("deploymentInput").and_then(Value::as_object_mut) {
                self.resolve_queue(input, warnings)?;
            }
            let tasks = phase
                .get_mut("workflowTasks")
                .and_then(Value::as_array_mut)
                .into_iter()
                .flatten()
                .filter_map(Value::as_object_mut);
            for task in tasks {
                self.steps.remap_workflow_task(task);
            }
        }
        Ok(())
    }
}

/// Point an `artifactSourceDefinitionUrl` at the target project and build,
/// keeping every other query parameter
fn rewrite_definition_url(raw: &str, project_id: &str, definition_id: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = match key.as_ref() {
                "projectId" => project_id.to_string(),
                "definitionId" => definition_id.to_string(),
                _ => value.into_owned(),
            };
            (key.into_owned(), value)
        })
        .collect();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    Some(url.to_string())
}

impl RestoreHandler for ReleaseDefinitionRestore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ReleaseDefinition
    }

    fn find_existing(&self, _snapshot: &Snapshot, payload: &ResourceDocument) -> Option<String> {
        self.index.find(payload)
    }

    fn resolve(
        &self,
        _ctx: &RestoreContext<'_>,
        _snapshot: &Snapshot,
        payload: &mut ResourceDocument,
        warnings: &mut Vec<String>,
    ) -> Result<(), Unresolved> {
        if let Some(Value::Array(artifacts)) = payload.get_mut("artifacts") {
            for artifact in artifacts.iter_mut().filter_map(Value::as_object_mut) {
                self.resolve_artifact(artifact)?;
            }
        }

        self.drop_groups(payload.get_mut("variableGroups"), warnings)?;

        if let Some(Value::Array(environments)) = payload.get_mut("environments") {
            for environment in environments.iter_mut().filter_map(Value::as_object_mut) {
                self.resolve_environment(environment, warnings)?;
            }
        }
        Ok(())
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
    use tempfile::TempDir;

    const TARGET_PROJECT: &str = "web-next-id";

    fn release(name: &str, repo_id: &str) -> Value {
        json!({
            "id": 3,
            "name": name,
            "revision": 12,
            "createdBy": {"id": "x"},
            "modifiedBy": {"id": "x"},
            "lastRelease": {"id": 40},
            "variableGroups": [1],
            "artifacts": [
                {
                    "alias": "_App",
                    "type": "Git",
                    "sourceId": format!("web-id:{}", repo_id),
                    "definitionReference": {
                        "definition": {"id": repo_id, "name": "App"},
                        "project": {"id": "web-id", "name": "Web"},
                        "branches": {"id": "main", "name": "main"}
                    }
                },
                {
                    "alias": "_CI",
                    "type": "Build",
                    "sourceId": "web-id:12",
                    "definitionReference": {
                        "definition": {"id": "12", "name": "CI"},
                        "project": {"id": "web-id", "name": "Web"},
                        "artifactSourceDefinitionUrl": {
                            "id": "https://dev.azure.com/contoso/_permalink/_build/index?collectionId=c1&projectId=web-id&definitionId=12",
                            "name": ""
                        }
                    }
                }
            ],
            "environments": [{
                "name": "Prod",
                "variableGroups": [1, 2],
                "deployPhases": [
                    {
                        "phaseType": 1,
                        "deploymentInput": {"queueId": 5},
                        "workflowTasks": [{"taskId": "tg-src", "inputs": {"ConnectedServiceName": "ep-src"}}]
                    },
                    {"phaseType": 4, "deploymentInput": {"queueId": 0}, "workflowTasks": []}
                ]
            }]
        })
    }

    fn seeded() -> InMemoryApi {
        let api = InMemoryApi::new();
        api.seed(&source(), ResourceKind::Repository, json!({"id": "src-app", "name": "App"}));
        api.seed(&target(), ResourceKind::Repository, json!({"id": "dst-app", "name": "App"}));
        api.seed(&source(), ResourceKind::BuildDefinition, json!({"id": 12, "name": "CI"}));
        api.seed(&target(), ResourceKind::BuildDefinition, json!({"id": 77, "name": "CI"}));
        api.seed(&source(), ResourceKind::AgentQueue, json!({"id": 5, "name": "Deployers"}));
        api.seed(&target(), ResourceKind::AgentQueue, json!({"id": 50, "name": "Deployers"}));
        api.seed(&source(), ResourceKind::VariableGroup, json!({"id": 1, "name": "Shared"}));
        api.seed(&source(), ResourceKind::VariableGroup, json!({"id": 2, "name": "Prod secrets"}));
        api.seed(&target(), ResourceKind::VariableGroup, json!({"id": 9, "name": "Shared"}));
        api.seed(&source(), ResourceKind::TaskGroup, json!({"id": "tg-src", "name": "Deploy"}));
        api.seed(&target(), ResourceKind::TaskGroup, json!({"id": "tg-dst", "name": "Deploy"}));
        api.seed(&source(), ResourceKind::ServiceConnection, json!({"id": "ep-src", "name": "arm"}));
        api.seed(&target(), ResourceKind::ServiceConnection, json!({"id": "ep-dst", "name": "arm"}));
        api
    }

    #[test]
    fn test_release_references_are_rewritten() {
        let temp = TempDir::new().unwrap();
        let api = seeded();
        let mirror = RecordingMirror::default();
        write_snapshot(temp.path(), ResourceKind::ReleaseDefinition, "Deploy.json", release("Deploy", "src-app"));

        let report = run_restore(&api, &mirror, temp.path(), ResourceKind::ReleaseDefinition, RestoreOptions::default())
            .unwrap();
        assert_eq!(report.created(), 1, "{:?}", report.objects);
        assert_eq!(report.warnings(), 1);

        let created = &api.created(&target(), ResourceKind::ReleaseDefinition)[0];
        assert_eq!(
            created.pointer("/artifacts/0/sourceId"),
            Some(&json!(format!("{}:dst-app", TARGET_PROJECT)))
        );
        assert_eq!(
            created.pointer("/artifacts/0/definitionReference/project/id"),
            Some(&json!(TARGET_PROJECT))
        );
        assert_eq!(created.pointer("/artifacts/1/definitionReference/definition/id"), Some(&json!("77")));
        let url = created
            .str_at("/artifacts/1/definitionReference/artifactSourceDefinitionUrl/id")
            .unwrap();
        assert!(url.contains("definitionId=77"));
        assert!(url.contains(&format!("projectId={}", TARGET_PROJECT)));
        assert!(url.contains("collectionId=c1"));

        assert_eq!(created.get("variableGroups"), Some(&json!([9])));
        assert_eq!(created.pointer("/environments/0/variableGroups"), Some(&json!([9])));
        assert_eq!(created.pointer("/environments/0/deployPhases/0/deploymentInput/queueId"), Some(&json!(50)));
        assert_eq!(created.pointer("/environments/0/deployPhases/1/deploymentInput/queueId"), Some(&json!(0)));
        assert_eq!(
            created.pointer("/environments/0/deployPhases/0/workflowTasks/0/taskId"),
            Some(&json!("tg-dst"))
        );
        assert_eq!(
            created.pointer("/environments/0/deployPhases/0/workflowTasks/0/inputs/ConnectedServiceName"),
            Some(&json!("ep-dst"))
        );
        assert!(!created.contains_key("lastRelease"));
        assert!(!created.contains_key("modifiedBy"));
    }

    #[test]
    fn test_other_artifact_types_point_at_target_project() {
        let temp = TempDir::new().unwrap();
        let api = seeded();
        let mirror = RecordingMirror::default();
        let mut doc = release("Deploy", "src-app");
        doc["artifacts"] = json!([
            {
                "alias": "_images",
                "type": "AzureContainerRepository",
                "sourceId": "acr-conn:images",
                "definitionReference": {
                    "definition": {"id": "images", "name": "images"},
                    "project": {"id": "web-id", "name": "Web"},
                    "connection": {"id": "acr-conn", "name": "acr"}
                }
            },
            {
                "alias": "_upstream",
                "type": "Jenkins",
                "definitionReference": {"definition": {"id": "job-1", "name": "job"}}
            }
        ]);
        write_snapshot(temp.path(), ResourceKind::ReleaseDefinition, "Deploy.json", doc);

        let report = run_restore(&api, &mirror, temp.path(), ResourceKind::ReleaseDefinition, RestoreOptions::default())
            .unwrap();
        assert_eq!(report.created(), 1, "{:?}", report.objects);

        let created = &api.created(&target(), ResourceKind::ReleaseDefinition)[0];
        assert_eq!(
            created.pointer("/artifacts/0/definitionReference/project"),
            Some(&json!({"id": TARGET_PROJECT, "name": "Web Next"}))
        );
        assert_eq!(created.pointer("/artifacts/0/sourceId"), Some(&json!("acr-conn:images")));
        assert_eq!(
            created.pointer("/artifacts/0/definitionReference/definition/id"),
            Some(&json!("images"))
        );
        assert!(created.pointer("/artifacts/1/definitionReference/project").is_none());
    }

    #[test]
    fn test_unmapped_artifact_skips_release() {
        let temp = TempDir::new().unwrap();
        let api = seeded();
        let mirror = RecordingMirror::default();
        let mut doc = release("Deploy", "src-app");
        doc["artifacts"][1]["definitionReference"]["definition"] = json!({"id": "13", "name": "Nightly"});
        write_snapshot(temp.path(), ResourceKind::ReleaseDefinition, "Deploy.json", doc);

        let report = run_restore(&api, &mirror, temp.path(), ResourceKind::ReleaseDefinition, RestoreOptions::default())
            .unwrap();
        assert_eq!(report.skipped_unresolved(), 1);
        assert!(report.objects[0].outcome.detail().contains("'Nightly'"));
    }

    #[test]
    fn test_unmapped_queue_skips_release() {
        let temp = TempDir::new().unwrap();
        let api = seeded();
        let mirror = RecordingMirror::default();
        let mut doc = release("Deploy", "src-app");
        doc["environments"][0]["deployPhases"][0]["deploymentInput"]["queueId"] = json!(404);
        write_snapshot(temp.path(), ResourceKind::ReleaseDefinition, "Deploy.json", doc);

        let report = run_restore(&api, &mirror, temp.path(), ResourceKind::ReleaseDefinition, RestoreOptions::default())
            .unwrap();
        assert_eq!(report.skipped_unresolved(), 1);
        assert!(api.created(&target(), ResourceKind::ReleaseDefinition).is_empty());
    }

    #[test]
    fn test_rewrite_definition_url_keeps_other_params() {
        let url = rewrite_definition_url(
            "https://dev.azure.com/contoso/_permalink/_build/index?collectionId=c&projectId=p&definitionId=1",
            "np",
            "2",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://dev.azure.com/contoso/_permalink/_build/index?collectionId=c&projectId=np&definitionId=2"
        );
        assert!(rewrite_definition_url("not a url", "p", "1").is_none());
    }
}
