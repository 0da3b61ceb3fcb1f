//! Path management for azdo-vault
//!
//! ## Path Resolution Order
//!
//! 1. `AZDO_VAULT_HOME` environment variable (if set)
//! 2. The platform config directory for `azdo-vault` (via `directories`),
//!    e.g. `~/.config/azdo-vault` on Linux or `%APPDATA%\azdo-vault\config`
//!    on Windows

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::VaultError;

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "AZDO_VAULT_HOME";

/// Manages all paths used by azdo-vault
#[derive(Debug, Clone)]
pub struct VaultPaths {
    base_dir: PathBuf,
}

impl VaultPaths {
    /// Resolve the base directory from the environment or the platform
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, VaultError> {
        let base_dir = match std::env::var_os(HOME_ENV) {
            Some(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => ProjectDirs::from("", "", "azdo-vault")
                .map(|dirs| dirs.config_dir().to_path_buf())
                .ok_or_else(|| VaultError::Config("Could not determine a home directory".into()))?,
        };
        Ok(Self { base_dir })
    }

    /// Create VaultPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Backup root used when an organization is added without one
    pub fn default_backup_root(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Ensure the base directory exists
    pub fn ensure_directories(&self) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| VaultError::Io(format!("Failed to create base directory: {}", e)))
    }

    /// Whether a settings file has been written
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(paths.default_backup_root(), temp_dir.path().join("backups"));
        assert!(!paths.is_initialized());
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let paths = VaultPaths::with_base_dir(nested.clone());

        paths.ensure_directories().unwrap();
        assert!(nested.is_dir());
    }
}
