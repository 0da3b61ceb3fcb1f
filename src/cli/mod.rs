//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod backup;
pub mod configure;
pub mod list;
pub mod restore;

pub use backup::{handle_backup_command, BackupArgs};
pub use configure::{handle_configure_command, ConfigureCommands};
pub use list::{handle_list_command, ListArgs};
pub use restore::{handle_restore_command, RestoreArgs};

use clap::ValueEnum;

use crate::backup::RunReport;
use crate::display::format_run_report;
use crate::error::VaultResult;
use crate::models::ResourceKind;

/// Object kinds accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Every backed-up kind, in dependency order
    All,
    #[value(name = "feeds", alias = "artifacts-feeds")]
    Feeds,
    #[value(name = "branch-policies")]
    BranchPolicies,
    #[value(name = "build-definitions")]
    BuildDefinitions,
    #[value(name = "release-definitions")]
    ReleaseDefinitions,
    #[value(name = "yaml-pipelines")]
    YamlPipelines,
    #[value(name = "service-connections")]
    ServiceConnections,
    #[value(name = "task-groups")]
    TaskGroups,
    #[value(name = "variable-groups")]
    VariableGroups,
    #[value(name = "wikis")]
    Wikis,
    /// Listing only
    #[value(name = "repositories")]
    Repositories,
    /// Listing only
    #[value(name = "agent-queues")]
    AgentQueues,
}

/// Restore order for `all`: referenced kinds before the kinds that
/// reference them
const ALL_IN_ORDER: [ResourceKind; 9] = [
    ResourceKind::ServiceConnection,
    ResourceKind::VariableGroup,
    ResourceKind::TaskGroup,
    ResourceKind::Feed,
    ResourceKind::Wiki,
    ResourceKind::BuildDefinition,
    ResourceKind::YamlPipeline,
    ResourceKind::ReleaseDefinition,
    ResourceKind::BranchPolicy,
];

impl KindArg {
    pub fn kinds(self) -> Vec<ResourceKind> {
        let kind = match self {
            Self::All => return ALL_IN_ORDER.to_vec(),
            Self::Feeds => ResourceKind::Feed,
            Self::BranchPolicies => ResourceKind::BranchPolicy,
            Self::BuildDefinitions => ResourceKind::BuildDefinition,
            Self::ReleaseDefinitions => ResourceKind::ReleaseDefinition,
            Self::YamlPipelines => ResourceKind::YamlPipeline,
            Self::ServiceConnections => ResourceKind::ServiceConnection,
            Self::TaskGroups => ResourceKind::TaskGroup,
            Self::VariableGroups => ResourceKind::VariableGroup,
            Self::Wikis => ResourceKind::Wiki,
            Self::Repositories => ResourceKind::Repository,
            Self::AgentQueues => ResourceKind::AgentQueue,
        };
        vec![kind]
    }
}

/// Print a finished run either as a table or as JSON
pub fn print_report(report: &RunReport, json: bool) -> VaultResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", format_run_report(report));
        println!();
    }
    Ok(())
}
