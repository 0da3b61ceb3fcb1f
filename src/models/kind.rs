//! Resource kinds known to the vault

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every object kind the API collaborator can list or fetch.
///
/// The first nine are the kinds that get snapshots; the rest exist only as
/// reference targets (repositories, identities, agent queues).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Feed,
    BranchPolicy,
    BuildDefinition,
    ReleaseDefinition,
    YamlPipeline,
    ServiceConnection,
    TaskGroup,
    VariableGroup,
    Wiki,
    Repository,
    Identity,
    AgentQueue,
}

impl ResourceKind {
    /// Kinds that are backed up and restored
    pub const SNAPSHOT_KINDS: [ResourceKind; 9] = [
        ResourceKind::Feed,
        ResourceKind::BranchPolicy,
        ResourceKind::BuildDefinition,
        ResourceKind::ReleaseDefinition,
        ResourceKind::YamlPipeline,
        ResourceKind::ServiceConnection,
        ResourceKind::TaskGroup,
        ResourceKind::VariableGroup,
        ResourceKind::Wiki,
    ];

    /// Directory name under `{backupRoot}/{org}/{project}/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Feed => "artifacts-feeds",
            Self::BranchPolicy => "branch-policies",
            Self::BuildDefinition => "build-definitions",
            Self::ReleaseDefinition => "release-definitions",
            Self::YamlPipeline => "yaml-pipelines",
            Self::ServiceConnection => "service-connections",
            Self::TaskGroup => "task-groups",
            Self::VariableGroup => "variable-groups",
            Self::Wiki => "wikis",
            Self::Repository => "repositories",
            Self::Identity => "identities",
            Self::AgentQueue => "agent-queues",
        }
    }

    /// Human-readable singular label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::BranchPolicy => "branch policy",
            Self::BuildDefinition => "build definition",
            Self::ReleaseDefinition => "release definition",
            Self::YamlPipeline => "yaml pipeline",
            Self::ServiceConnection => "service connection",
            Self::TaskGroup => "task group",
            Self::VariableGroup => "variable group",
            Self::Wiki => "wiki",
            Self::Repository => "repository",
            Self::Identity => "identity",
            Self::AgentQueue => "agent queue",
        }
    }

    /// Plural label for summaries
    pub fn plural(&self) -> String {
        match self {
            Self::BranchPolicy => "branch policies".to_string(),
            Self::Repository => "repositories".to_string(),
            Self::Identity => "identities".to_string(),
            other => format!("{}s", other.label()),
        }
    }

    pub fn is_snapshot_kind(&self) -> bool {
        Self::SNAPSHOT_KINDS.contains(self)
    }

    /// Whether the server assigns integer ids for this kind
    pub fn uses_numeric_ids(&self) -> bool {
        matches!(
            self,
            Self::BranchPolicy
                | Self::BuildDefinition
                | Self::ReleaseDefinition
                | Self::YamlPipeline
                | Self::VariableGroup
                | Self::AgentQueue
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_dirs_are_distinct() {
        let mut dirs: Vec<_> = ResourceKind::SNAPSHOT_KINDS
            .iter()
            .map(|k| k.dir_name())
            .collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), ResourceKind::SNAPSHOT_KINDS.len());
    }

    #[test]
    fn test_reference_only_kinds() {
        assert!(ResourceKind::Wiki.is_snapshot_kind());
        assert!(!ResourceKind::Repository.is_snapshot_kind());
        assert!(!ResourceKind::Identity.is_snapshot_kind());
    }

    #[test]
    fn test_display_uses_label() {
        assert_eq!(ResourceKind::BranchPolicy.to_string(), "branch policy");
        assert_eq!(ResourceKind::Feed.dir_name(), "artifacts-feeds");
        assert_eq!(ResourceKind::BranchPolicy.plural(), "branch policies");
        assert_eq!(ResourceKind::Wiki.plural(), "wikis");
    }
}
