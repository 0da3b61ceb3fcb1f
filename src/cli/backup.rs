//! Backup CLI command

use clap::Args;
use tracing::info;

use super::{print_report, KindArg};
use crate::api::ResourceApi;
use crate::backup::{BackupContext, BackupManager};
use crate::config::Settings;
use crate::error::VaultResult;
use crate::models::SelectionSet;
use crate::services;
use crate::storage::SnapshotStore;
use crate::vcs::Mirror;

/// Arguments of `azdo-vault backup`
#[derive(Debug, Args)]
pub struct BackupArgs {
    /// Kind of object to back up
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Organization alias (defaults to the configured default)
    #[arg(long)]
    pub org: Option<String>,

    /// Project to back up
    #[arg(long)]
    pub project: String,

    /// Names, ids or snapshot filenames to back up; `all` selects everything
    #[arg(long, num_args = 1.., default_value = "all")]
    pub select: Vec<String>,
}

/// Handle `azdo-vault backup`
pub fn handle_backup_command(
    settings: &Settings,
    api: &dyn ResourceApi,
    mirror: &dyn Mirror,
    args: BackupArgs,
    json: bool,
) -> VaultResult<()> {
    let scope = settings.scope(args.org.as_deref(), &args.project)?;
    let root = settings.snapshot_root(args.org.as_deref(), &args.project)?;
    let selection = SelectionSet::parse(&args.select);
    info!(scope = %scope, root = %root.display(), "backup started");

    for kind in args.kind.kinds() {
        let manager = BackupManager::new(BackupContext {
            api,
            mirror,
            scope: scope.clone(),
            store: SnapshotStore::new(root.join(kind.dir_name())),
        });
        let report = services::backup(&manager, kind, &selection)?;
        print_report(&report, json)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: BackupArgs,
    }

    #[test]
    fn test_select_keeps_commas_in_names() {
        let parsed = Harness::try_parse_from([
            "backup",
            "task-groups",
            "--project",
            "Web",
            "--select",
            "Build, test and publish",
            "--select",
            "Login",
        ])
        .unwrap();
        assert_eq!(parsed.args.select, vec!["Build, test and publish", "Login"]);

        let defaulted = Harness::try_parse_from(["backup", "wikis", "--project", "Web"]).unwrap();
        assert!(SelectionSet::parse(&defaulted.args.select).is_all());
    }
}
