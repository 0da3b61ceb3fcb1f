//! Service connections
//!
//! Secrets never leave the service, so a restored connection carries its
//! shape but not its credentials.

use super::{project_reference, NameIndex};
use crate::api::ProjectInfo;
use crate::backup::{RestoreContext, RestoreHandler};
use crate::error::VaultResult;
use crate::models::{ResourceDocument, ResourceKind};
use crate::resolve::Unresolved;
use crate::storage::Snapshot;

const CREDENTIALS_NOTE: &str = "credentials are not exported and must be re-authored manually";

pub struct ServiceConnectionRestore {
    project: ProjectInfo,
    index: NameIndex,
}

impl ServiceConnectionRestore {
    pub fn prepare(ctx: &RestoreContext<'_>) -> VaultResult<Self> {
        Ok(Self {
            project: ctx.api.project(&ctx.target)?,
            index: NameIndex::load(ctx.api, ResourceKind::ServiceConnection, &ctx.target)?,
        })
    }
}

impl RestoreHandler for ServiceConnectionRestore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ServiceConnection
    }

    fn find_existing(&self, _snapshot: &Snapshot, payload: &ResourceDocument) -> Option<String> {
        self.index.find(payload)
    }

    fn resolve(
        &self,
        _ctx: &RestoreContext<'_>,
        _snapshot: &Snapshot,
        payload: &mut ResourceDocument,
        _warnings: &mut Vec<String>,
    ) -> Result<(), Unresolved> {
        let references = project_reference(&self.project, payload);
        payload.insert("serviceEndpointProjectReferences", references);
        Ok(())
    }

    fn record_created(&mut self, payload: &ResourceDocument, created: &ResourceDocument) {
        self.index.record(payload, created);
    }

    fn failure_note(&self) -> Option<&'static str> {
        Some(CREDENTIALS_NOTE)
    }
}
