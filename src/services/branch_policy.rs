//! Branch policies
//!
//! Policies have no name. Backup files them as `{id}_{type}.json` and
//! records who their reviewers were and which build they gate on, since
//! neither can be looked up from a bare id once the source is out of reach.
//! Restore translates repository scopes (critical), reviewers (critical when
//! required) and the gating build (best-effort), and spots duplicates by
//! signature.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use super::created_summary;
use crate::api::ResourceApi;
use crate::backup::{BackupContext, BackupHandler, RestoreContext, RestoreHandler};
use crate::error::{ApiResult, VaultResult};
use crate::models::{
    BackupHints, IdentityHint, ObjectId, ObjectSummary, ResourceDocument, ResourceKind, Scope, SelectionSet,
};
use crate::resolve::{shaped_like, IdentityResolver, MissPolicy, ReferenceMap, Unresolved};
use crate::signature::{find_duplicate, policy_signature};
use crate::storage::{snapshot_filename, Snapshot};

// === Backup ===

pub struct BranchPolicyBackup;

impl BackupHandler for BranchPolicyBackup {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BranchPolicy
    }

    /// Id or filename, or the name of a repository the policy applies to.
    /// Project-wide policies apply to every repository.
    fn select(
        &self,
        ctx: &BackupContext<'_>,
        listed: Vec<ObjectSummary>,
        selection: &SelectionSet,
    ) -> ApiResult<Vec<ObjectSummary>> {
        if selection.is_all() {
            return Ok(listed);
        }

        let selected_repos: HashSet<String> = ctx
            .api
            .list(&ctx.scope, ResourceKind::Repository)?
            .into_iter()
            .filter(|repo| selection.contains(&repo.name))
            .map(|repo| repo.id.key())
            .collect();

        Ok(listed
            .into_iter()
            .filter(|policy| {
                let file = snapshot_filename(ResourceKind::BranchPolicy, &policy.record);
                selection.matches(None, Some(&policy.id), Some(&file))
                    || applies_to_any(&policy.record, &selected_repos)
            })
            .collect())
    }

    fn capture_hints(
        &self,
        ctx: &BackupContext<'_>,
        document: &ResourceDocument,
        warnings: &mut Vec<String>,
    ) -> BackupHints {
        let mut hints = BackupHints::default();

        for reviewer in reviewer_ids(document) {
            match ctx.api.get(&ctx.scope, ResourceKind::Identity, &ObjectId::from(reviewer.as_str())) {
                Ok(identity) => hints.add_identity(&reviewer, IdentityHint::from_identity(&identity)),
                Err(e) => warnings.push(format!("reviewer {} could not be looked up: {}", reviewer, e)),
            }
        }

        if let Some(build_id) = document.pointer("/settings/buildDefinitionId").and_then(ObjectId::from_value) {
            match ctx.api.get(&ctx.scope, ResourceKind::BuildDefinition, &build_id) {
                Ok(build) => hints.add_build_definition(&build_id, build.name().unwrap_or_default()),
                Err(e) => warnings.push(format!("build definition {} could not be looked up: {}", build_id, e)),
            }
        }

        hints
    }
}

fn applies_to_any(policy: &ResourceDocument, repo_keys: &HashSet<String>) -> bool {
    if repo_keys.is_empty() {
        return false;
    }
    scopes(policy).any(|scope| match scope.get("repositoryId").and_then(ObjectId::from_value) {
        Some(repo) => repo_keys.contains(&repo.key()),
        None => true,
    })
}

fn scopes(policy: &ResourceDocument) -> impl Iterator<Item = &Map<String, Value>> {
    policy
        .pointer("/settings/scope")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

/// Distinct reviewer ids from `requiredReviewerIds` and `requiredReviewers`
fn reviewer_ids(policy: &ResourceDocument) -> Vec<String> {
    let bare = policy
        .pointer("/settings/requiredReviewerIds")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    let objects = policy
        .pointer("/settings/requiredReviewers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|r| r.get("id"))
        .filter_map(Value::as_str);

    let mut seen = HashSet::new();
    bare.chain(objects)
        .filter(|id| seen.insert(id.to_lowercase()))
        .map(str::to_string)
        .collect()
}

// === Restore ===

pub struct BranchPolicyRestore {
    repositories: ReferenceMap,
    builds: ReferenceMap,
    identities: IdentityResolver,
    existing: Vec<ObjectSummary>,
}

impl BranchPolicyRestore {
    /// Build the repository and build maps, and search the target
    /// organization once for every reviewer hinted in any snapshot
    pub fn prepare(ctx: &RestoreContext<'_>, snapshots: &[Snapshot]) -> VaultResult<Self> {
        let hints = snapshots
            .iter()
            .map(|s| s.document.hints())
            .collect::<VaultResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        Ok(Self {
            repositories: ReferenceMap::build(ctx.api, ResourceKind::Repository, &ctx.source, &ctx.target)?,
            builds: ReferenceMap::target_only(ctx.api, ResourceKind::BuildDefinition, &ctx.target)?,
            identities: IdentityResolver::build(ctx.api, &ctx.target, &hints),
            existing: ctx.api.list(&ctx.target, ResourceKind::BranchPolicy)?,
        })
    }

    /// Build from already-fetched parts
    pub fn from_parts(
        api: &dyn ResourceApi,
        target: &Scope,
        repositories: ReferenceMap,
        builds: ReferenceMap,
        identities: IdentityResolver,
    ) -> ApiResult<Self> {
        Ok(Self {
            repositories,
            builds,
            identities,
            existing: api.list(target, ResourceKind::BranchPolicy)?,
        })
    }

    fn translate_scopes(&self, payload: &mut ResourceDocument, policy: MissPolicy) -> Result<(), Unresolved> {
        let Some(scopes) = payload
            .pointer_mut("/settings/scope")
            .and_then(Value::as_array_mut)
        else {
            return Ok(());
        };
        for scope in scopes.iter_mut().filter_map(Value::as_object_mut) {
            match scope.get_mut("repositoryId") {
                Some(repo) if !repo.is_null() => {
                    self.repositories.remap_value(repo, policy)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve_reviewers(
        &self,
        settings: &mut Map<String, Value>,
        hints: &BackupHints,
        warnings: &mut Vec<String>,
    ) -> Result<(), Unresolved> {
        if let Some(Value::Array(ids)) = settings.get_mut("requiredReviewerIds") {
            if !ids.is_empty() {
                let first = ids.first().and_then(Value::as_str).unwrap_or_default().to_string();
                let total = ids.len();
                let mapped: Vec<Value> = ids
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|id| self.identities.resolve(id))
                    .map(ObjectId::to_value)
                    .collect();
                check_mapped(hints, &first, mapped.len(), total, "required reviewers", warnings)?;
                *ids = mapped;
            }
        }

        if let Some(Value::Array(reviewers)) = settings.get_mut("requiredReviewers") {
            if !reviewers.is_empty() {
                let first = reviewers
                    .first()
                    .and_then(|r| r.get("id"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let total = reviewers.len();
                let mut mapped = Vec::with_capacity(total);
                for mut reviewer in reviewers.drain(..) {
                    let target = reviewer
                        .get("id")
                        .and_then(Value::as_str)
                        .and_then(|id| self.identities.resolve(id));
                    if let (Some(target), Some(obj)) = (target, reviewer.as_object_mut()) {
                        obj.insert("id".into(), target.to_value());
                        mapped.push(reviewer);
                    }
                }
                check_mapped(hints, &first, mapped.len(), total, "reviewers", warnings)?;
                *reviewers = mapped;
            }
        }
        Ok(())
    }

    fn resolve_build(&self, settings: &mut Map<String, Value>, hints: &BackupHints, warnings: &mut Vec<String>) {
        let Some(slot) = settings.get_mut("buildDefinitionId") else {
            return;
        };
        let Some(source_id) = ObjectId::from_value(slot) else {
            return;
        };
        let target = hints
            .build_definition_name(&source_id)
            .and_then(|name| self.builds.target_id(name));
        match target {
            Some(target) => {
                debug!(source = %source_id, target = %target, "build definition remapped");
                *slot = shaped_like(target, slot);
            }
            None => warnings.push(format!(
                "build definition {} not found in target; left unmapped",
                hints.build_definition_name(&source_id).unwrap_or("(no hint)")
            )),
        }
    }
}

/// A non-empty reviewer list needs hints and at least one mapped identity.
/// Partial lists keep what mapped and record a warning.
fn check_mapped(
    hints: &BackupHints,
    first: &str,
    mapped: usize,
    total: usize,
    what: &str,
    warnings: &mut Vec<String>,
) -> Result<(), Unresolved> {
    if hints.identities.is_empty() {
        return Err(Unresolved::new(
            ResourceKind::Identity,
            "required reviewers",
            "have no backup hints",
        ));
    }
    if mapped == 0 {
        let reference = hints
            .identity(first)
            .map(|h| if h.unique_name.is_empty() { h.display_name.clone() } else { h.unique_name.clone() })
            .unwrap_or_else(|| first.to_string());
        return Err(Unresolved::new(
            ResourceKind::Identity,
            reference,
            "has no match in the target organization",
        ));
    }
    if mapped < total {
        warnings.push(format!("{} of {} {} not found in target; dropped", total - mapped, total, what));
    }
    Ok(())
}

impl RestoreHandler for BranchPolicyRestore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BranchPolicy
    }

    fn find_existing(&self, _snapshot: &Snapshot, payload: &ResourceDocument) -> Option<String> {
        let mut translated = payload.clone();
        self.translate_scopes(&mut translated, MissPolicy::KeepStale).ok()?;
        let signature = policy_signature(&translated);
        find_duplicate(&signature, &self.existing).map(|found| format!("policy {}", found.id))
    }

    fn resolve(
        &self,
        _ctx: &RestoreContext<'_>,
        snapshot: &Snapshot,
        payload: &mut ResourceDocument,
        warnings: &mut Vec<String>,
    ) -> Result<(), Unresolved> {
        self.translate_scopes(payload, MissPolicy::Skip)?;

        let hints = snapshot.document.hints().ok().flatten().unwrap_or_default();
        if let Some(settings) = payload.settings_mut() {
            self.resolve_reviewers(settings, &hints, warnings)?;
            self.resolve_build(settings, &hints, warnings);
        }
        Ok(())
    }

    fn record_created(&mut self, payload: &ResourceDocument, created: &ResourceDocument) {
        let mut summary = created_summary(ResourceKind::BranchPolicy, payload, created);
        if summary.record.settings().is_none() {
            summary.record = payload.clone();
        }
        self.existing.push(summary);
    }
}
