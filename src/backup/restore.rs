//! Restore orchestration
//!
//! Per object: sanitize, look for an equivalent in the target, resolve
//! references, create. Each step can end the object's run with its own
//! outcome; none of them can end the batch. The batch is a fold over the
//! selected snapshots producing one report entry each.
//!
//! What can end the run is limited to what happens before the first
//! object: a missing backup directory, a malformed snapshot, or reference
//! listings that cannot be fetched.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, warn};

use super::report::{ObjectReport, Operation, Outcome, RunReport};
use crate::api::ResourceApi;
use crate::error::{ApiResult, VaultResult};
use crate::models::{ObjectId, ResourceDocument, ResourceKind, Scope, SelectionSet};
use crate::resolve::Unresolved;
use crate::sanitize::sanitize;
use crate::storage::{Snapshot, SnapshotStore};
use crate::vcs::Mirror;

/// User-supplied restore knobs
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Source queue name -> target queue name
    pub queue_map: BTreeMap<String, String>,
    /// Target queue used when nothing else matches
    pub default_queue: Option<String>,
}

/// Collaborators and scopes of one restore run
pub struct RestoreContext<'a> {
    pub api: &'a dyn ResourceApi,
    pub mirror: &'a dyn Mirror,
    pub source: Scope,
    pub target: Scope,
    /// `{backupRoot}/{orgAlias}/{project}` of the source
    pub snapshot_root: PathBuf,
    pub options: RestoreOptions,
}

impl RestoreContext<'_> {
    pub fn store(&self, kind: ResourceKind) -> SnapshotStore {
        SnapshotStore::new(self.snapshot_root.join(kind.dir_name()))
    }
}

/// Per-kind restore behavior, built once per run after the reference maps
pub trait RestoreHandler {
    fn kind(&self) -> ResourceKind;

    /// Label of an equivalent object already in the target, if any
    fn find_existing(&self, snapshot: &Snapshot, payload: &ResourceDocument) -> Option<String>;

    /// Rewrite every embedded reference in `payload`. `Err` means a critical
    /// reference is missing and nothing must be created.
    fn resolve(
        &self,
        ctx: &RestoreContext<'_>,
        snapshot: &Snapshot,
        payload: &mut ResourceDocument,
        warnings: &mut Vec<String>,
    ) -> Result<(), Unresolved>;

    fn create(&self, ctx: &RestoreContext<'_>, payload: &ResourceDocument) -> ApiResult<ResourceDocument> {
        ctx.api.create(&ctx.target, self.kind(), payload)
    }

    /// Side work once the object exists (wiki content push)
    fn after_create(
        &self,
        _ctx: &RestoreContext<'_>,
        _snapshot: &Snapshot,
        _created: &ResourceDocument,
        _warnings: &mut Vec<String>,
    ) {
    }

    /// Remember a created object so a later equivalent snapshot in the same
    /// run is reported as existing
    fn record_created(&mut self, payload: &ResourceDocument, created: &ResourceDocument);

    /// Extra hint appended to create failures
    fn failure_note(&self) -> Option<&'static str> {
        None
    }
}

/// Runs restores from one source snapshot root into one target scope
pub struct RestoreManager<'a> {
    ctx: RestoreContext<'a>,
}

impl<'a> RestoreManager<'a> {
    pub fn new(ctx: RestoreContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RestoreContext<'a> {
        &self.ctx
    }

    /// Load the selected snapshots of `kind`. Fails on a missing directory
    /// or any malformed snapshot.
    pub fn load(&self, kind: ResourceKind, selection: &SelectionSet) -> VaultResult<Vec<Snapshot>> {
        self.ctx.store(kind).load_selected(selection)
    }

    /// Restore already-loaded snapshots through a prepared handler
    pub fn run(&self, handler: &mut dyn RestoreHandler, snapshots: &[Snapshot]) -> RunReport {
        let kind = handler.kind();
        info!(
            kind = %kind,
            source = %self.ctx.source,
            target = %self.ctx.target,
            count = snapshots.len(),
            "restoring"
        );

        let report = RunReport::new(
            kind,
            Operation::Restore,
            self.ctx.source.clone(),
            Some(self.ctx.target.clone()),
        );
        snapshots
            .iter()
            .fold(report, |mut report, snapshot| {
                report.objects.push(self.restore_one(handler, snapshot));
                report
            })
            .finish()
    }

    fn restore_one(&self, handler: &mut dyn RestoreHandler, snapshot: &Snapshot) -> ObjectReport {
        let kind = handler.kind();
        let label = snapshot.label();
        let file = Some(snapshot.filename.clone());
        let mut payload = sanitize(&snapshot.document, kind);

        if let Some(existing) = handler.find_existing(snapshot, &payload) {
            info!(kind = %kind, object = %label, existing = %existing, "already present in target");
            return ObjectReport::new(label, file, Outcome::SkippedExists { existing });
        }

        let mut warnings = Vec::new();
        if let Err(miss) = handler.resolve(&self.ctx, snapshot, &mut payload, &mut warnings) {
            log_warnings(kind, &label, &warnings);
            warn!(kind = %kind, object = %label, reason = %miss, "skipped: unresolved reference");
            return ObjectReport::new(
                label,
                file,
                Outcome::SkippedUnresolved {
                    reason: miss.to_string(),
                },
            )
            .with_warnings(warnings);
        }

        let outcome = match handler.create(&self.ctx, &payload) {
            Ok(created) => {
                handler.after_create(&self.ctx, snapshot, &created, &mut warnings);
                handler.record_created(&payload, &created);
                let target_id: Option<ObjectId> = created.id();
                info!(
                    kind = %kind,
                    object = %label,
                    target_id = %target_id.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "created"
                );
                Outcome::Created { target_id }
            }
            Err(e) => {
                let reason = match handler.failure_note() {
                    Some(note) => format!("{}; {}", e, note),
                    None => e.to_string(),
                };
                warn!(kind = %kind, object = %label, reason = %reason, "create failed");
                Outcome::Failed { reason }
            }
        };

        log_warnings(kind, &label, &warnings);
        ObjectReport::new(label, file, outcome).with_warnings(warnings)
    }
}

fn log_warnings(kind: ResourceKind, label: &str, warnings: &[String]) {
    for warning in warnings {
        warn!(kind = %kind, object = %label, "{}", warning);
    }
}
