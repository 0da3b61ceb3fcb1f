//! azdo-vault - backup and cross-project restore of Azure DevOps configuration
//!
//! Snapshots of pipelines, policies, connections and the like are written
//! one JSON document per object. Restoring them into another project (or
//! organization) means translating every embedded id through names, since
//! ids are only meaningful in the scope that issued them.
//!
//! # Architecture
//!
//! - `config`: settings file and organization aliases
//! - `error`: crate error types
//! - `models`: the open document model, ids, scopes, selections and hints
//! - `storage`: atomic JSON files and the per-kind snapshot store
//! - `api`: the service collaborator (`az rest`) and its in-memory double
//! - `resolve`: source id -> name -> target id maps per reference kind
//! - `sanitize`, `signature`: payload cleanup and duplicate detection
//! - `backup`: the backup and restore orchestrators and run reports
//! - `services`: per-kind backup and restore behavior
//! - `vcs`: git mirroring for project wiki content
//! - `cli`, `display`: the command-line surface
//!
//! # Example
//!
//! ```rust,ignore
//! use azdo_vault::config::{Settings, VaultPaths};
//!
//! let paths = VaultPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let scope = settings.scope(Some("contoso"), "Web")?;
//! ```

pub mod api;
pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod models;
pub mod resolve;
pub mod sanitize;
pub mod services;
pub mod signature;
pub mod storage;
pub mod vcs;

pub use error::{ApiError, VaultError, VaultResult};
