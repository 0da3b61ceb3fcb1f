//! Backup orchestration
//!
//! Lists a kind in the source scope, narrows the listing to the selection,
//! fetches full detail per object, captures hints, and writes one snapshot
//! per object. A failed fetch costs only that object; a failed write stops
//! the run because the backup directory itself is broken.

use tracing::{info, warn};

use super::report::{ObjectReport, Operation, Outcome, RunReport};
use crate::api::ResourceApi;
use crate::error::{ApiResult, VaultResult};
use crate::models::{BackupHints, ObjectSummary, ResourceDocument, ResourceKind, Scope, SelectionSet};
use crate::storage::{snapshot_filename, SnapshotStore};
use crate::vcs::Mirror;

/// Collaborators and location of one backup run
pub struct BackupContext<'a> {
    pub api: &'a dyn ResourceApi,
    pub mirror: &'a dyn Mirror,
    pub scope: Scope,
    pub store: SnapshotStore,
}

/// Per-kind backup behavior; the defaults cover plain named kinds
pub trait BackupHandler {
    fn kind(&self) -> ResourceKind;

    /// Narrow the listing to the selection (name, id or filename by default)
    fn select(
        &self,
        _ctx: &BackupContext<'_>,
        listed: Vec<ObjectSummary>,
        selection: &SelectionSet,
    ) -> ApiResult<Vec<ObjectSummary>> {
        let kind = self.kind();
        Ok(listed
            .into_iter()
            .filter(|s| {
                let file = snapshot_filename(kind, &s.record);
                selection.matches(Some(&s.name), Some(&s.id), Some(&file))
            })
            .collect())
    }

    /// Full document for a listed object; `None` leaves it out of the backup
    fn fetch(&self, ctx: &BackupContext<'_>, summary: &ObjectSummary) -> ApiResult<Option<ResourceDocument>> {
        ctx.api.get(&ctx.scope, self.kind(), &summary.id).map(Some)
    }

    /// Facts that cannot be re-derived from ids at restore time
    fn capture_hints(
        &self,
        _ctx: &BackupContext<'_>,
        _document: &ResourceDocument,
        _warnings: &mut Vec<String>,
    ) -> BackupHints {
        BackupHints::default()
    }

    fn filename(&self, document: &ResourceDocument) -> String {
        snapshot_filename(self.kind(), document)
    }

    /// Side work after the snapshot is on disk (wiki content mirrors)
    fn after_write(&self, _ctx: &BackupContext<'_>, _document: &ResourceDocument, _warnings: &mut Vec<String>) {}
}

/// Runs backups for one scope
pub struct BackupManager<'a> {
    ctx: BackupContext<'a>,
}

impl<'a> BackupManager<'a> {
    pub fn new(ctx: BackupContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BackupContext<'a> {
        &self.ctx
    }

    /// Back up every selected object of the handler's kind.
    ///
    /// Listing failures are run-level errors: without a listing nothing can
    /// be selected.
    pub fn run(&self, handler: &dyn BackupHandler, selection: &SelectionSet) -> VaultResult<RunReport> {
        let kind = handler.kind();
        let listed = self.ctx.api.list(&self.ctx.scope, kind)?;
        let selected = handler.select(&self.ctx, listed, selection)?;
        info!(kind = %kind, scope = %self.ctx.scope, count = selected.len(), "backing up");

        let mut report = RunReport::new(kind, Operation::Backup, self.ctx.scope.clone(), None);
        for summary in &selected {
            if let Some(object) = self.backup_one(handler, summary)? {
                report.objects.push(object);
            }
        }
        Ok(report.finish())
    }

    fn backup_one(&self, handler: &dyn BackupHandler, summary: &ObjectSummary) -> VaultResult<Option<ObjectReport>> {
        let kind = handler.kind();
        let label = if summary.name.is_empty() {
            summary.id.to_string()
        } else {
            summary.name.clone()
        };

        let mut document = match handler.fetch(&self.ctx, summary) {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(kind = %kind, object = %label, error = %e, "fetch failed");
                return Ok(Some(ObjectReport::new(
                    label,
                    None,
                    Outcome::Failed {
                        reason: e.to_string(),
                    },
                )));
            }
        };

        let mut warnings = Vec::new();
        let hints = handler.capture_hints(&self.ctx, &document, &mut warnings);
        document.set_hints(&hints)?;

        let filename = handler.filename(&document);
        self.ctx.store.write(&filename, &document)?;
        handler.after_write(&self.ctx, &document, &mut warnings);

        for warning in &warnings {
            warn!(kind = %kind, object = %label, "{}", warning);
        }
        info!(kind = %kind, object = %label, file = %filename, "saved");

        Ok(Some(
            ObjectReport::new(label, Some(filename.clone()), Outcome::Saved { file: filename })
                .with_warnings(warnings),
        ))
    }
}
