//! Error types for azdo-vault
//!
//! `VaultError` is the crate-wide error used by configuration, storage and
//! the orchestrators. `ApiError` is what the backing API collaborator
//! surfaces; it keeps "not found" apart from "rejected" so the restore loop
//! can decide between skipping and failing an object.

use std::path::Path;

use thiserror::Error;

use crate::models::ResourceKind;

/// Errors surfaced by a `ResourceApi` implementation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The requested object does not exist in the scope
    #[error("{kind} not found: {identifier}")]
    NotFound {
        kind: ResourceKind,
        identifier: String,
    },

    /// The service understood the request and refused it
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The call never produced a usable response (auth, network, spawn)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response was not the JSON shape we expected
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    pub fn not_found(kind: ResourceKind, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for API collaborator calls
pub type ApiResult<T> = Result<T, ApiError>;

/// `entity_type` of a missing backup directory
const BACKUP_DIRECTORY: &str = "Backup directory";

/// The main error type for azdo-vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid input or document shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A snapshot file exists but cannot be parsed
    #[error("Malformed snapshot {path}: {message}")]
    MalformedSnapshot { path: String, message: String },

    /// Mirror clone/push failures
    #[error("VCS error: {0}")]
    Vcs(String),

    /// Errors from the API collaborator
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl VaultError {
    /// Create a "not found" error for organization aliases
    pub fn organization_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Organization",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for backup directories
    pub fn backup_dir_not_found(path: &Path) -> Self {
        Self::NotFound {
            entity_type: BACKUP_DIRECTORY,
            identifier: path.display().to_string(),
        }
    }

    pub fn malformed_snapshot(path: &Path, message: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. }) || matches!(self, Self::Api(e) if e.is_not_found())
    }

    /// Whether a multi-kind invocation must stop at this error. A missing
    /// backup directory only means that kind was never backed up.
    pub fn is_fatal_for_run(&self) -> bool {
        !matches!(
            self,
            Self::NotFound {
                entity_type: BACKUP_DIRECTORY,
                ..
            }
        )
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for azdo-vault operations
pub type VaultResult<T> = Result<T, VaultError>;
