//! Classic build definitions

use serde_json::{json, Value};
use tracing::debug;

use super::repository::RepositoryResolver;
use super::{NameIndex, StepReferences};
use crate::backup::{RestoreContext, RestoreHandler};
use crate::error::VaultResult;
use crate::models::{ResourceDocument, ResourceKind};
use crate::resolve::{MissPolicy, QueueMatch, QueueResolver, ReferenceMap, Unresolved};
use crate::storage::Snapshot;

pub struct BuildDefinitionRestore {
    repositories: RepositoryResolver,
    queues: QueueResolver,
    variable_groups: ReferenceMap,
    steps: StepReferences,
    index: NameIndex,
}

impl BuildDefinitionRestore {
    pub fn prepare(ctx: &RestoreContext<'_>) -> VaultResult<Self> {
        let target_queues = ctx.api.list(&ctx.target, ResourceKind::AgentQueue)?;
        Ok(Self {
            repositories: RepositoryResolver::build(ctx.api, &ctx.source, &ctx.target)?,
            queues: QueueResolver::new(
                &target_queues,
                &ctx.options.queue_map,
                ctx.options.default_queue.as_deref(),
            )?,
            variable_groups: ReferenceMap::build(ctx.api, ResourceKind::VariableGroup, &ctx.source, &ctx.target)?,
            steps: StepReferences::build(ctx.api, &ctx.source, &ctx.target)?,
            index: NameIndex::load(ctx.api, ResourceKind::BuildDefinition, &ctx.target)?,
        })
    }

    fn resolve_queue(&self, payload: &mut ResourceDocument, warnings: &mut Vec<String>) -> Result<(), Unresolved> {
        let source = payload.str_at("/queue/name").map(str::to_string);
        let queue = self.queues.resolve(source.as_deref()).ok_or_else(|| {
            Unresolved::new(
                ResourceKind::AgentQueue,
                source.clone().unwrap_or_else(|| "(none)".to_string()),
                "has no match in the target project and no default queue was given",
            )
        })?;

        if queue.matched == QueueMatch::Default {
            if let Some(source) = &source {
                warnings.push(format!("queue '{}' not found in target; using default '{}'", source, queue.name));
            }
        }
        debug!(queue = %queue.name, matched = ?queue.matched, "queue resolved");
        payload.insert("queue", json!({ "id": queue.id.to_value(), "name": queue.name }));
        Ok(())
    }
}

impl RestoreHandler for BuildDefinitionRestore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BuildDefinition
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
        match payload.get_mut("repository").and_then(Value::as_object_mut) {
            Some(repository) => {
                self.repositories.rewrite(repository)?;
            }
            None => {
                return Err(Unresolved::new(
                    ResourceKind::Repository,
                    "(none)",
                    "is missing from the definition",
                ))
            }
        }

        self.resolve_queue(payload, warnings)?;

        if let Some(Value::Array(groups)) = payload.get_mut("variableGroups") {
            let dropped = self.variable_groups.remap_list(groups, MissPolicy::Drop)?;
            if dropped > 0 {
                warnings.push(format!("{} variable group(s) not found in target; dropped", dropped));
            }
        }

        if let Some(phases) = payload.pointer_mut("/process/phases").and_then(Value::as_array_mut) {
            let steps = phases
                .iter_mut()
                .filter_map(|phase| phase.get_mut("steps"))
                .filter_map(Value::as_array_mut)
                .flatten()
                .filter_map(Value::as_object_mut);
            for step in steps {
                self.steps.remap_build_step(step);
            }
        }
        Ok(())
    }

    fn record_created(&mut self, payload: &ResourceDocument, created: &ResourceDocument) {
        self.index.record(payload, created);
    }
}
