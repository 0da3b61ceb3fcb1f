//! Restore CLI command

use clap::Args;
use tracing::warn;

use super::{print_report, KindArg};
use crate::api::ResourceApi;
use crate::backup::{RestoreContext, RestoreManager, RestoreOptions};
use crate::config::Settings;
use crate::error::VaultResult;
use crate::models::SelectionSet;
use crate::resolve::parse_queue_map;
use crate::services;
use crate::vcs::Mirror;

/// Arguments of `azdo-vault restore`
#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Kind of object to restore
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Organization alias the snapshots were taken from
    #[arg(long)]
    pub source_org: Option<String>,

    /// Project the snapshots were taken from
    #[arg(long)]
    pub source_project: String,

    /// Organization alias to restore into (defaults to the source)
    #[arg(long)]
    pub target_org: Option<String>,

    /// Project to restore into (defaults to the source project)
    #[arg(long)]
    pub target_project: Option<String>,

    /// Names, ids or snapshot filenames to restore; `all` selects everything
    #[arg(long, num_args = 1.., default_value = "all")]
    pub select: Vec<String>,

    /// Agent queue rename, SourceQueue=TargetQueue (repeatable)
    #[arg(long = "queue-map", value_name = "SRC=DST")]
    pub queue_map: Vec<String>,

    /// Target agent queue used when a queue has no other match
    #[arg(long)]
    pub default_queue: Option<String>,
}

/// Handle `azdo-vault restore`
pub fn handle_restore_command(
    settings: &Settings,
    api: &dyn ResourceApi,
    mirror: &dyn Mirror,
    args: RestoreArgs,
    json: bool,
) -> VaultResult<()> {
    let source_org = args.source_org.as_deref();
    let target_org = args.target_org.as_deref().or(source_org);
    let target_project = args.target_project.as_deref().unwrap_or(args.source_project.as_str());

    let ctx = RestoreContext {
        api,
        mirror,
        source: settings.scope(source_org, &args.source_project)?,
        target: settings.scope(target_org, target_project)?,
        snapshot_root: settings.snapshot_root(source_org, &args.source_project)?,
        options: RestoreOptions {
            queue_map: parse_queue_map(&args.queue_map)?,
            default_queue: args.default_queue.clone(),
        },
    };
    let manager = RestoreManager::new(ctx);
    let selection = SelectionSet::parse(&args.select);

    let kinds = args.kind.kinds();
    let several = kinds.len() > 1;
    for kind in kinds {
        match services::restore(&manager, kind, &selection) {
            Ok(report) => print_report(&report, json)?,
            Err(e) if several && !e.is_fatal_for_run() => {
                warn!(kind = %kind, error = %e, "nothing to restore");
                if !json {
                    println!("Skipping {}: {}\n", kind.plural(), e);
                }
            }
            Err(e) => return Err(e),
        }
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
        args: RestoreArgs,
    }

    #[test]
    fn test_select_accepts_several_values_with_commas() {
        let parsed = Harness::try_parse_from([
            "restore",
            "variable-groups",
            "--source-project",
            "Web",
            "--select",
            "Shared, prod",
            "Shared.json",
        ])
        .unwrap();
        assert_eq!(parsed.args.select, vec!["Shared, prod", "Shared.json"]);
    }
}
