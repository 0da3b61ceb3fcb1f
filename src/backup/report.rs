//! Per-run reports
//!
//! Every processed object gets exactly one [`ObjectReport`]; the run report
//! is what the CLI prints and what callers inspect instead of errors.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ObjectId, ResourceKind, Scope};

/// Terminal state of one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    /// Backup wrote a snapshot
    Saved { file: String },
    /// Restore created the object in the target
    Created { target_id: Option<ObjectId> },
    /// An equivalent object already exists in the target
    SkippedExists { existing: String },
    /// A critical reference has no target counterpart
    SkippedUnresolved { reason: String },
    /// The service refused or the call failed
    Failed { reason: String },
}

impl Outcome {
    /// Short status word for tables
    pub fn status(&self) -> &'static str {
        match self {
            Self::Saved { .. } => "saved",
            Self::Created { .. } => "created",
            Self::SkippedExists { .. } => "exists",
            Self::SkippedUnresolved { .. } => "unresolved",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Self::Saved { file } => file.clone(),
            Self::Created { target_id } => target_id
                .as_ref()
                .map(|id| format!("id {}", id))
                .unwrap_or_default(),
            Self::SkippedExists { existing } => format!("matches {}", existing),
            Self::SkippedUnresolved { reason } | Self::Failed { reason } => reason.clone(),
        }
    }
}

/// Outcome and warnings for one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectReport {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ObjectReport {
    pub fn new(label: impl Into<String>, file: Option<String>, outcome: Outcome) -> Self {
        Self {
            label: label.into(),
            file,
            outcome,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Backup,
    Restore,
}

/// Report of one backup or restore run over a single kind
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub kind: ResourceKind,
    pub operation: Operation,
    pub source: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Scope>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub objects: Vec<ObjectReport>,
}

impl RunReport {
    pub fn new(kind: ResourceKind, operation: Operation, source: Scope, target: Option<Scope>) -> Self {
        Self {
            kind,
            operation,
            source,
            target,
            started_at: Utc::now(),
            finished_at: None,
            objects: Vec::new(),
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    fn count(&self, status: &str) -> usize {
        self.objects
            .iter()
            .filter(|o| o.outcome.status() == status)
            .count()
    }

    pub fn saved(&self) -> usize {
        self.count("saved")
    }

    pub fn created(&self) -> usize {
        self.count("created")
    }

    pub fn skipped_exists(&self) -> usize {
        self.count("exists")
    }

    pub fn skipped_unresolved(&self) -> usize {
        self.count("unresolved")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    pub fn warnings(&self) -> usize {
        self.objects.iter().map(|o| o.warnings.len()).sum()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        let counts = match self.operation {
            Operation::Backup => format!("{} saved, {} failed", self.saved(), self.failed()),
            Operation::Restore => format!(
                "{} created, {} already present, {} unresolved, {} failed",
                self.created(),
                self.skipped_exists(),
                self.skipped_unresolved(),
                self.failed()
            ),
        };
        let warnings = match self.warnings() {
            0 => String::new(),
            1 => " (1 warning)".to_string(),
            n => format!(" ({} warnings)", n),
        };
        let op = match self.operation {
            Operation::Backup => "Backup",
            Operation::Restore => "Restore",
        };
        format!("{} of {}: {}{}", op, self.kind.plural(), counts, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("https://dev.azure.com/contoso", "Web")
    }

    #[test]
    fn test_restore_summary() {
        let mut report = RunReport::new(ResourceKind::VariableGroup, Operation::Restore, scope(), Some(scope()));
        report.objects.push(ObjectReport::new(
            "a",
            None,
            Outcome::Created {
                target_id: Some(ObjectId::Number(4)),
            },
        ));
        report.objects.push(
            ObjectReport::new(
                "b",
                None,
                Outcome::SkippedExists {
                    existing: "b".into(),
                },
            )
            .with_warnings(vec!["w1".into(), "w2".into()]),
        );
        let report = report.finish();

        assert_eq!(report.created(), 1);
        assert_eq!(report.skipped_exists(), 1);
        assert!(report.finished_at.is_some());
        assert_eq!(
            report.summary(),
            "Restore of variable groups: 1 created, 1 already present, 0 unresolved, 0 failed (2 warnings)"
        );
    }

    #[test]
    fn test_backup_summary() {
        let mut report = RunReport::new(ResourceKind::Wiki, Operation::Backup, scope(), None);
        report.objects.push(ObjectReport::new("Docs", None, Outcome::Saved { file: "Docs.json".into() }));
        assert_eq!(report.summary(), "Backup of wikis: 1 saved, 0 failed");
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let value = serde_json::to_value(Outcome::Failed { reason: "409".into() }).unwrap();
        assert_eq!(value, serde_json::json!({"status": "failed", "reason": "409"}));
    }
}
