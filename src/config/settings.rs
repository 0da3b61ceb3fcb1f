//! User settings for azdo-vault
//!
//! Organizations are registered under a short alias. Each carries its URL
//! and the directory its snapshots are written under.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::VaultPaths;
use crate::api::az::DEFAULT_RESOURCE_GUID;
use crate::error::{VaultError, VaultResult};
use crate::models::Scope;
use crate::storage::{read_json, write_json_atomic};

/// One registered organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationConfig {
    /// e.g. `https://dev.azure.com/contoso`
    pub url: String,
    /// Snapshots land in `{backupRoot}/{alias}/{project}/{kindDir}`
    pub backup_root: PathBuf,
}

/// User settings for azdo-vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Schema version for migration support
    pub schema_version: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_organization: Option<String>,

    pub organizations: BTreeMap<String, OrganizationConfig>,

    /// AAD resource passed to `az rest --resource`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_guid: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            default_organization: None,
            organizations: BTreeMap::new(),
            resource_guid: None,
        }
    }
}

impl Settings {
    /// Load settings from disk, or defaults if the file doesn't exist yet
    pub fn load_or_create(paths: &VaultPaths) -> VaultResult<Self> {
        let settings_path = paths.settings_file();
        if !settings_path.exists() {
            // Don't save yet - let caller decide when to persist
            return Ok(Settings::default());
        }
        read_json(&settings_path)
            .map_err(|e| VaultError::Config(format!("Failed to load settings: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &VaultPaths) -> VaultResult<()> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    /// Register (or replace) an organization. The first one added becomes
    /// the default.
    pub fn add_organization(
        &mut self,
        alias: &str,
        url: &str,
        backup_root: PathBuf,
    ) -> VaultResult<&OrganizationConfig> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(VaultError::Validation("Organization alias cannot be empty".into()));
        }
        let url = url.trim().trim_end_matches('/');
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(VaultError::Validation(format!(
                "Organization URL must be absolute, got '{}'",
                url
            )));
        }

        if self.default_organization.is_none() {
            self.default_organization = Some(alias.to_string());
        }
        let config = OrganizationConfig {
            url: url.to_string(),
            backup_root,
        };
        self.organizations.insert(alias.to_string(), config.clone());
        self.organizations
            .get(alias)
            .ok_or_else(|| VaultError::organization_not_found(alias))
    }

    /// Remove an organization, clearing the default if it pointed there
    pub fn remove_organization(&mut self, alias: &str) -> VaultResult<OrganizationConfig> {
        let removed = self
            .organizations
            .remove(alias)
            .ok_or_else(|| VaultError::organization_not_found(alias))?;
        if self.default_organization.as_deref() == Some(alias) {
            self.default_organization = None;
        }
        Ok(removed)
    }

    pub fn set_default(&mut self, alias: &str) -> VaultResult<()> {
        if !self.organizations.contains_key(alias) {
            return Err(VaultError::organization_not_found(alias));
        }
        self.default_organization = Some(alias.to_string());
        Ok(())
    }

    /// The named organization, or the default one when no alias is given
    pub fn resolve_organization<'a>(
        &'a self,
        alias: Option<&'a str>,
    ) -> VaultResult<(&'a str, &'a OrganizationConfig)> {
        let alias = alias
            .or(self.default_organization.as_deref())
            .ok_or_else(|| {
                VaultError::Config(
                    "No organization given and no default configured; run `azdo-vault configure add` first"
                        .into(),
                )
            })?;
        self.organizations
            .get_key_value(alias)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| VaultError::organization_not_found(alias))
    }

    /// Scope of `project` in the given (or default) organization
    pub fn scope(&self, alias: Option<&str>, project: &str) -> VaultResult<Scope> {
        let project = project.trim();
        if project.is_empty() {
            return Err(VaultError::Validation("Project name cannot be empty".into()));
        }
        let (_, org) = self.resolve_organization(alias)?;
        Ok(Scope::new(org.url.as_str(), project))
    }

    /// `{backupRoot}/{alias}/{project}` for the given (or default) organization
    pub fn snapshot_root(&self, alias: Option<&str>, project: &str) -> VaultResult<PathBuf> {
        let (alias, org) = self.resolve_organization(alias)?;
        Ok(org.backup_root.join(alias).join(project.trim()))
    }

    /// Resource id for `az rest`, falling back to the Azure DevOps one
    pub fn resource_guid(&self) -> &str {
        self.resource_guid
            .as_deref()
            .filter(|guid| !guid.trim().is_empty())
            .unwrap_or(DEFAULT_RESOURCE_GUID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_contoso() -> Settings {
        let mut settings = Settings::default();
        settings
            .add_organization("contoso", "https://dev.azure.com/contoso/", PathBuf::from("/backups"))
            .unwrap();
        settings
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.schema_version, 1);
        assert!(settings.organizations.is_empty());
        assert_eq!(settings.resource_guid(), DEFAULT_RESOURCE_GUID);
    }

    #[test]
    fn test_first_organization_becomes_default() {
        let mut settings = with_contoso();
        assert_eq!(settings.default_organization.as_deref(), Some("contoso"));
        assert_eq!(settings.organizations["contoso"].url, "https://dev.azure.com/contoso");

        settings
            .add_organization("fabrikam", "https://fabrikam.visualstudio.com", PathBuf::from("/b2"))
            .unwrap();
        assert_eq!(settings.default_organization.as_deref(), Some("contoso"));

        settings.set_default("fabrikam").unwrap();
        let (alias, org) = settings.resolve_organization(None).unwrap();
        assert_eq!(alias, "fabrikam");
        assert_eq!(org.backup_root, PathBuf::from("/b2"));
    }

    #[test]
    fn test_add_rejects_bad_input() {
        let mut settings = Settings::default();
        assert!(settings
            .add_organization(" ", "https://dev.azure.com/x", PathBuf::from("/b"))
            .unwrap_err()
            .is_validation());
        assert!(settings
            .add_organization("x", "dev.azure.com/x", PathBuf::from("/b"))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_remove_clears_default() {
        let mut settings = with_contoso();
        settings.remove_organization("contoso").unwrap();
        assert!(settings.default_organization.is_none());
        assert!(settings.remove_organization("contoso").unwrap_err().is_not_found());
        assert!(matches!(settings.resolve_organization(None), Err(VaultError::Config(_))));
    }

    #[test]
    fn test_unknown_alias_is_not_found() {
        let settings = with_contoso();
        assert!(settings.resolve_organization(Some("nope")).unwrap_err().is_not_found());
        assert!(settings.clone().set_default("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_scope_and_snapshot_root() {
        let settings = with_contoso();
        let scope = settings.scope(None, " Web ").unwrap();
        assert_eq!(scope.org_name(), "contoso");
        assert_eq!(scope.project, "Web");

        let root = settings.snapshot_root(Some("contoso"), "Web").unwrap();
        assert_eq!(root, PathBuf::from("/backups").join("contoso").join("Web"));

        assert!(settings.scope(None, "").unwrap_err().is_validation());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().join("home"));

        let mut settings = with_contoso();
        settings.resource_guid = Some("custom-guid".into());
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.resource_guid(), "custom-guid");

        let raw = std::fs::read_to_string(paths.settings_file()).unwrap();
        assert!(raw.contains("\"defaultOrganization\""));
        assert!(raw.contains("\"backupRoot\""));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"organizations": {}}"#).unwrap();
        assert_eq!(settings.schema_version, 1);
        assert!(settings.default_organization.is_none());
    }

    #[test]
    fn test_load_without_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        assert_eq!(Settings::load_or_create(&paths).unwrap(), Settings::default());
    }
}
