//! Snapshot -> creation payload
//!
//! Strips the fields the server owns (ids, revisions, audit stamps, links)
//! so a snapshot can be replayed as a create request. Top-level only: nested
//! `id`s are references, not server-managed fields, and are left for the
//! resolvers.

use crate::models::{ResourceDocument, ResourceKind, HINTS_KEY};

/// Removed from every kind
const SERVER_MANAGED_FIELDS: &[&str] = &[
    "id",
    "revision",
    "url",
    "_links",
    "createdBy",
    "createdDate",
    "createdOn",
    "modifiedBy",
    "modifiedDate",
    "modifiedOn",
    HINTS_KEY,
];

/// Additional fields per kind
fn kind_fields(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::BranchPolicy => &["isEnterpriseManaged"],
        ResourceKind::BuildDefinition => &["authoredBy", "queueStatus", "uri", "project"],
        ResourceKind::ReleaseDefinition => &["createdById", "modifiedById", "lastRelease"],
        ResourceKind::ServiceConnection => &[
            "creationDate",
            "owner",
            "administratorsGroup",
            "readersGroup",
            "serviceEndpointProjectReferences",
            "operationStatus",
        ],
        ResourceKind::TaskGroup => &["uri"],
        ResourceKind::VariableGroup => &["variableGroupProjectReferences"],
        ResourceKind::Wiki => &["remoteUrl", "properties", "projectId"],
        ResourceKind::Feed => &["project", "permissions", "fullyQualifiedId", "viewId", "viewName"],
        ResourceKind::YamlPipeline
        | ResourceKind::Repository
        | ResourceKind::Identity
        | ResourceKind::AgentQueue => &[],
    }
}

/// Common fields that hold user data for some kinds. A service
/// connection's `url` is the endpoint it connects to.
fn kind_keeps(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::ServiceConnection => &["url"],
        _ => &[],
    }
}

/// Copy `snapshot` without its server-managed fields. The snapshot itself
/// is left untouched.
pub fn sanitize(snapshot: &ResourceDocument, kind: ResourceKind) -> ResourceDocument {
    let keep = kind_keeps(kind);
    let mut payload = snapshot.clone();
    for field in SERVER_MANAGED_FIELDS
        .iter()
        .filter(|f| !keep.contains(*f))
        .chain(kind_fields(kind))
    {
        payload.remove(field);
    }
    payload
}
