//! Configure CLI commands
//!
//! Organizations are registered once under an alias; every other command
//! refers to them by that alias.

use clap::Subcommand;
use std::path::PathBuf;

use crate::config::{Settings, VaultPaths};
use crate::error::VaultResult;

/// Configure subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigureCommands {
    /// Register an organization (or update an existing alias)
    Add {
        /// Short alias used by --org, --source-org and --target-org
        alias: String,
        /// Organization URL, e.g. https://dev.azure.com/contoso
        url: String,
        /// Directory snapshots are written under
        #[arg(long)]
        backup_root: Option<PathBuf>,
        /// Make this the default organization
        #[arg(long)]
        default: bool,
    },

    /// List registered organizations
    List,

    /// Forget an organization (its snapshots are kept)
    Remove {
        alias: String,
    },

    /// Choose the organization used when no alias is given
    SetDefault {
        alias: String,
    },

    /// Set or clear the AAD resource passed to `az rest`
    ResourceGuid {
        /// Omit to go back to the Azure DevOps resource
        guid: Option<String>,
    },
}

/// Handle a configure command
pub fn handle_configure_command(
    paths: &VaultPaths,
    settings: &mut Settings,
    cmd: ConfigureCommands,
) -> VaultResult<()> {
    match cmd {
        ConfigureCommands::Add {
            alias,
            url,
            backup_root,
            default,
        } => {
            let backup_root = backup_root.unwrap_or_else(|| paths.default_backup_root());
            let org = settings.add_organization(&alias, &url, backup_root)?.clone();
            if default {
                settings.set_default(alias.trim())?;
            }
            settings.save(paths)?;
            println!("Added organization '{}'", alias.trim());
            println!("  URL:         {}", org.url);
            println!("  Backup root: {}", org.backup_root.display());
        }

        ConfigureCommands::List => {
            if settings.organizations.is_empty() {
                println!("No organizations configured.");
                println!("Add one with: azdo-vault configure add <alias> <url>");
                return Ok(());
            }
            let alias_width = settings.organizations.keys().map(String::len).max().unwrap_or(5).max(5);
            for (alias, org) in &settings.organizations {
                let marker = if settings.default_organization.as_deref() == Some(alias.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:<alias_width$}  {}  {}",
                    marker,
                    alias,
                    org.url,
                    org.backup_root.display(),
                    alias_width = alias_width,
                );
            }
            println!();
            println!("Resource GUID: {}", settings.resource_guid());
            println!("Settings file: {}", paths.settings_file().display());
        }

        ConfigureCommands::Remove { alias } => {
            settings.remove_organization(&alias)?;
            settings.save(paths)?;
            println!("Removed organization '{}'", alias);
        }

        ConfigureCommands::SetDefault { alias } => {
            settings.set_default(&alias)?;
            settings.save(paths)?;
            println!("Default organization: {}", alias);
        }

        ConfigureCommands::ResourceGuid { guid } => {
            settings.resource_guid = guid.filter(|g| !g.trim().is_empty());
            settings.save(paths)?;
            println!("Resource GUID: {}", settings.resource_guid());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_persists_with_default_backup_root() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let mut settings = Settings::default();

        handle_configure_command(
            &paths,
            &mut settings,
            ConfigureCommands::Add {
                alias: "contoso".into(),
                url: "https://dev.azure.com/contoso".into(),
                backup_root: None,
                default: false,
            },
        )
        .unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.default_organization.as_deref(), Some("contoso"));
        assert_eq!(loaded.organizations["contoso"].backup_root, paths.default_backup_root());
    }

    #[test]
    fn test_remove_unknown_alias_fails_without_saving() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let mut settings = Settings::default();

        let err = handle_configure_command(&paths, &mut settings, ConfigureCommands::Remove { alias: "x".into() })
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!paths.is_initialized());
    }
}
