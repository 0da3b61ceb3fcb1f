//! Backup and restore runs
//!
//! # Architecture
//!
//! The run layer consists of two managers driving per-kind handlers:
//!
//! - `BackupManager`: lists a kind in the source scope and writes one
//!   snapshot per selected object
//! - `RestoreManager`: loads snapshots, resolves their references against
//!   the target scope and creates what is missing
//!
//! Both produce a [`RunReport`] with one entry per object. Only problems
//! that make the whole run meaningless (no listing, no backup directory,
//! unreadable snapshots) are returned as errors.
//!
//! # Snapshot Layout
//!
//! Snapshots live under `{backupRoot}/{orgAlias}/{project}/{kindDir}/`, one
//! pretty-printed JSON document per object, with backup hints embedded
//! under `_backupHints`.
//!
//! # Example
//!
//! ```rust,ignore
//! use azdo_vault::backup::{BackupContext, BackupManager};
//! use azdo_vault::services;
//!
//! let manager = BackupManager::new(BackupContext { api: &api, mirror: &git, scope, store });
//! let handler = services::backup_handler(ResourceKind::VariableGroup)?;
//! let report = manager.run(handler.as_ref(), &SelectionSet::All)?;
//! println!("{}", report.summary());
//! ```

mod manager;
pub mod report;
mod restore;

pub use manager::{BackupContext, BackupHandler, BackupManager};
pub use report::{ObjectReport, Operation, Outcome, RunReport};
pub use restore::{RestoreContext, RestoreHandler, RestoreManager, RestoreOptions};
