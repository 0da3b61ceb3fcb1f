//! Identity resolution
//!
//! Identities cannot be listed per project, so the source side of the map
//! comes from backup hints and the target side from one org-wide search per
//! distinct hinted identity, done up front for the whole run.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::api::ResourceApi;
use crate::models::{BackupHints, IdentityHint, ObjectId, ResourceDocument, Scope};

/// Source identity id -> target identity id, built once per run
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    targets: HashMap<String, ObjectId>,
}

impl IdentityResolver {
    /// Search the target organization for every hinted identity.
    ///
    /// A failed search leaves that identity unresolved rather than aborting
    /// the run; objects needing it are skipped later.
    pub fn build<'a, I>(api: &dyn ResourceApi, target: &Scope, hints: I) -> Self
    where
        I: IntoIterator<Item = &'a BackupHints>,
    {
        let mut targets = HashMap::new();

        for hints in hints {
            for (source_id, hint) in &hints.identities {
                if targets.contains_key(source_id) {
                    continue;
                }
                match find_target_identity(api, target, hint) {
                    Some(id) => {
                        debug!(source = %source_id, target = %id, unique_name = %hint.unique_name, "identity resolved");
                        targets.insert(source_id.clone(), id);
                    }
                    None => {
                        warn!(
                            source = %source_id,
                            unique_name = %hint.unique_name,
                            display_name = %hint.display_name,
                            "identity not found in target organization"
                        );
                    }
                }
            }
        }

        Self { targets }
    }

    /// Target id for a source identity id
    pub fn resolve(&self, source_id: &str) -> Option<&ObjectId> {
        self.targets.get(&source_id.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Search by unique name first and by display name if that finds nothing
fn find_target_identity(api: &dyn ResourceApi, target: &Scope, hint: &IdentityHint) -> Option<ObjectId> {
    let queries = [hint.unique_name.as_str(), hint.display_name.as_str()];

    for query in queries.iter().filter(|q| !q.trim().is_empty()) {
        match api.search_identities(target, query) {
            Ok(candidates) if !candidates.is_empty() => {
                return pick_identity(hint, &candidates);
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(query = %query, error = %e, "identity search failed");
                continue;
            }
        }
    }
    None
}

/// Exact unique name, then exact display name, then the first candidate
pub fn pick_identity(hint: &IdentityHint, candidates: &[ResourceDocument]) -> Option<ObjectId> {
    let names: Vec<(IdentityHint, Option<ObjectId>)> = candidates
        .iter()
        .map(|c| (IdentityHint::from_identity(c), c.id()))
        .collect();

    let exact_unique = names.iter().find(|(n, id)| {
        id.is_some()
            && !hint.unique_name.is_empty()
            && n.unique_name.eq_ignore_ascii_case(&hint.unique_name)
    });
    let exact_display = || {
        names.iter().find(|(n, id)| {
            id.is_some()
                && !hint.display_name.is_empty()
                && n.display_name.eq_ignore_ascii_case(&hint.display_name)
        })
    };

    exact_unique
        .or_else(exact_display)
        .and_then(|(_, id)| id.clone())
        .or_else(|| names.iter().find_map(|(_, id)| id.clone()))
}
