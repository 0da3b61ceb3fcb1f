//! Variable groups
//!
//! Secret values are never returned by the service, so secret variables are
//! dropped and reported. A group left with no variables gets a placeholder
//! because the service refuses empty groups.

use serde_json::{json, Map, Value};

use super::{project_reference, NameIndex};
use crate::api::ProjectInfo;
use crate::backup::{RestoreContext, RestoreHandler};
use crate::error::VaultResult;
use crate::models::{ResourceDocument, ResourceKind};
use crate::resolve::{MissPolicy, ReferenceMap, Unresolved};
use crate::storage::Snapshot;

const PLACEHOLDER_NAME: &str = "temp";
const PLACEHOLDER_VALUE: &str = "placeholder";

pub struct VariableGroupRestore {
    project: ProjectInfo,
    endpoints: ReferenceMap,
    index: NameIndex,
}

impl VariableGroupRestore {
    pub fn prepare(ctx: &RestoreContext<'_>) -> VaultResult<Self> {
        Ok(Self {
            project: ctx.api.project(&ctx.target)?,
            endpoints: ReferenceMap::build(ctx.api, ResourceKind::ServiceConnection, &ctx.source, &ctx.target)?,
            index: NameIndex::load(ctx.api, ResourceKind::VariableGroup, &ctx.target)?,
        })
    }
}

/// Remove secret variables, returning their names
fn strip_secrets(payload: &mut ResourceDocument) -> Vec<String> {
    let Some(Value::Object(variables)) = payload.get_mut("variables") else {
        return Vec::new();
    };
    let secrets: Vec<String> = variables
        .iter()
        .filter(|(_, v)| v.get("isSecret").and_then(Value::as_bool).unwrap_or(false))
        .map(|(k, _)| k.clone())
        .collect();
    for name in &secrets {
        variables.shift_remove(name);
    }
    secrets
}

impl RestoreHandler for VariableGroupRestore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::VariableGroup
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
        for secret in strip_secrets(payload) {
            warnings.push(format!("secret variable '{}' removed; re-author its value in the target", secret));
        }

        let empty = payload
            .get("variables")
            .and_then(Value::as_object)
            .map_or(true, |v| v.is_empty());
        if empty {
            let mut placeholder = Map::new();
            placeholder.insert(PLACEHOLDER_NAME.to_string(), json!({ "value": PLACEHOLDER_VALUE }));
            payload.insert("variables", Value::Object(placeholder));
            warnings.push(format!("no variables left; added placeholder '{}'", PLACEHOLDER_NAME));
        }

        let references = project_reference(&self.project, payload);
        payload.insert("variableGroupProjectReferences", references);

        if let Some(endpoint) = payload.pointer_mut("/providerData/serviceEndpointId") {
            if !matches!(self.endpoints.remap_value(endpoint, MissPolicy::KeepStale), Ok(true)) {
                warnings.push("Key Vault service connection not found in target; left unmapped".to_string());
            }
        }
        Ok(())
    }

    fn record_created(&mut self, payload: &ResourceDocument, created: &ResourceDocument) {
        self.index.record(payload, created);
    }
}
