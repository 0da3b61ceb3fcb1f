use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use azdo_vault::api::AzCliApi;
use azdo_vault::cli::{
    handle_backup_command, handle_configure_command, handle_list_command, handle_restore_command, BackupArgs,
    ConfigureCommands, ListArgs, RestoreArgs,
};
use azdo_vault::config::{Settings, VaultPaths};
use azdo_vault::vcs::GitMirror;

#[derive(Parser)]
#[command(
    name = "azdo-vault",
    version,
    about = "Back up Azure DevOps configuration and restore it into another project",
    long_about = "azdo-vault snapshots Azure DevOps configuration objects (pipelines, \
                  branch policies, service connections, variable and task groups, \
                  wikis, feeds) to JSON files and re-creates them in another project \
                  or organization, translating every embedded reference by name. \
                  Restores are idempotent: objects already present are skipped."
)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// AAD resource passed to `az rest` (overrides the configured one)
    #[arg(long, global = true, env = "AZDO_VAULT_RESOURCE_GUID")]
    resource_guid: Option<String>,

    /// Print reports as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage organization aliases
    #[command(subcommand)]
    Configure(ConfigureCommands),

    /// Snapshot objects of a project to disk
    Backup(BackupArgs),

    /// Re-create snapshotted objects in a target project
    Restore(RestoreArgs),

    /// Show the objects that currently exist in a project
    List(ListArgs),
}

/// `AZDO_VAULT_LOG`, then `RUST_LOG`, then `warn`; `-v` flags win
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => std::env::var("AZDO_VAULT_LOG")
            .ok()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let paths = VaultPaths::new()?;
    let mut settings = Settings::load_or_create(&paths)?;

    let resource_guid = cli
        .resource_guid
        .clone()
        .unwrap_or_else(|| settings.resource_guid().to_string());
    let api = AzCliApi::new(resource_guid);
    let mirror = GitMirror::new();

    match cli.command {
        Commands::Configure(cmd) => handle_configure_command(&paths, &mut settings, cmd)?,
        Commands::Backup(args) => handle_backup_command(&settings, &api, &mirror, args, cli.json)?,
        Commands::Restore(args) => handle_restore_command(&settings, &api, &mirror, args, cli.json)?,
        Commands::List(args) => handle_list_command(&settings, &api, args, cli.json)?,
    }

    Ok(())
}
