//! Configuration module for azdo-vault
//!
//! - Path resolution for the settings file
//! - Organization aliases, backup roots and the `az rest` resource id

pub mod paths;
pub mod settings;

pub use paths::VaultPaths;
pub use settings::{OrganizationConfig, Settings};
