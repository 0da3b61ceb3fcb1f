//! Repository mirroring for project wikis
//!
//! A project wiki's content is a whole git repository rather than an API
//! object, so backup keeps a bare mirror next to the snapshot and restore
//! pushes it into the new wiki's backing repository.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{VaultError, VaultResult};

/// Mirror transport used for wiki content
pub trait Mirror {
    /// Bare mirror clone of `remote_url` into `local_path`
    fn mirror_clone(&self, remote_url: &str, local_path: &Path) -> VaultResult<()>;

    /// Push every ref of the mirror at `local_path` to `remote_url`
    fn mirror_push(&self, local_path: &Path, remote_url: &str) -> VaultResult<()>;
}

/// `Mirror` that shells out to the `git` executable
#[derive(Debug, Clone)]
pub struct GitMirror {
    program: String,
}

impl Default for GitMirror {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str], cwd: Option<&Path>) -> VaultResult<()> {
        debug!(program = %self.program, ?args, "running git");

        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .map_err(|e| VaultError::Vcs(format!("failed to run {}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(VaultError::Vcs(format!(
                "{} {} failed: {}",
                self.program,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

impl Mirror for GitMirror {
    fn mirror_clone(&self, remote_url: &str, local_path: &Path) -> VaultResult<()> {
        if local_path.exists() {
            std::fs::remove_dir_all(local_path).map_err(|e| {
                VaultError::Vcs(format!(
                    "cannot replace existing mirror {}: {}",
                    local_path.display(),
                    e
                ))
            })?;
        }
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let target = local_path.to_string_lossy();
        self.run(&["clone", "--mirror", remote_url, &target], None)
    }

    fn mirror_push(&self, local_path: &Path, remote_url: &str) -> VaultResult<()> {
        if !local_path.is_dir() {
            return Err(VaultError::Vcs(format!(
                "mirror not found: {}",
                local_path.display()
            )));
        }
        self.run(&["push", "--mirror", remote_url], Some(local_path))
    }
}
