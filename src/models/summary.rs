//! Listing records

use super::document::ResourceDocument;
use super::hints::IdentityHint;
use super::ids::ObjectId;
use super::kind::ResourceKind;

/// One entry of a scope listing: id, name, and the record it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub id: ObjectId,
    pub name: String,
    pub record: ResourceDocument,
}

impl ObjectSummary {
    /// Build a summary from a listing record; records without an id are not
    /// addressable and yield `None`.
    pub fn from_record(kind: ResourceKind, record: ResourceDocument) -> Option<Self> {
        let id = record.id()?;
        let name = match kind {
            ResourceKind::BranchPolicy => record.type_name().map(str::to_string),
            ResourceKind::Identity => {
                let hint = IdentityHint::from_identity(&record);
                if hint.unique_name.is_empty() {
                    Some(hint.display_name)
                } else {
                    Some(hint.unique_name)
                }
            }
            _ => record.name().map(str::to_string),
        }
        .unwrap_or_default();

        Some(Self { id, name, record })
    }
}
