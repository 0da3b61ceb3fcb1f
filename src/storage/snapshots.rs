//! Snapshot store: one pretty-printed JSON document per object

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::file_io::write_json_atomic;
use crate::error::{VaultError, VaultResult};
use crate::models::{ResourceDocument, ResourceKind, SelectionSet};

/// A snapshot read back from disk
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub filename: String,
    pub path: PathBuf,
    pub document: ResourceDocument,
}

impl Snapshot {
    /// Name, then filename stem; used as the report label
    pub fn label(&self) -> String {
        match self.document.name() {
            Some(name) => name.to_string(),
            None => self
                .filename
                .strip_suffix(".json")
                .unwrap_or(self.filename.as_str())
                .to_string(),
        }
    }

    pub fn is_selected(&self, selection: &SelectionSet) -> bool {
        selection.matches(
            self.document.name(),
            self.document.id().as_ref(),
            Some(&self.filename),
        )
    }
}

/// Snapshot directory for a single resource kind
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Write a snapshot; the directory is created on first write
    pub fn write(&self, filename: &str, document: &ResourceDocument) -> VaultResult<PathBuf> {
        let path = self.dir.join(filename);
        write_json_atomic(&path, document)?;
        debug!(path = %path.display(), "snapshot written");
        Ok(path)
    }

    /// Raw bytes of every `*.json` file, sorted by filename
    pub fn read_all(&self) -> VaultResult<Vec<(String, Vec<u8>)>> {
        if !self.exists() {
            return Err(VaultError::backup_dir_not_found(&self.dir));
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| {
            VaultError::Storage(format!("Failed to read {}: {}", self.dir.display(), e))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.ends_with(".json") {
                continue;
            }
            let bytes = fs::read(&path).map_err(|e| {
                VaultError::Storage(format!("Failed to read {}: {}", path.display(), e))
            })?;
            files.push((filename, bytes));
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Parse every snapshot and keep the selected ones.
    ///
    /// Every file is parsed, selected or not: one unreadable snapshot means
    /// the backup is corrupt and the whole run stops here.
    pub fn load_selected(&self, selection: &SelectionSet) -> VaultResult<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for (filename, bytes) in self.read_all()? {
            let path = self.dir.join(&filename);
            let document = ResourceDocument::from_slice(&bytes)
                .map_err(|e| VaultError::malformed_snapshot(&path, e.to_string()))?;
            let snapshot = Snapshot {
                filename,
                path,
                document,
            };
            if snapshot.is_selected(selection) {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }
}

/// Replace every run of characters outside `[A-Za-z0-9._-]` with one `_`
pub fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

/// Snapshot filename for an object of the given kind.
///
/// Branch policies have no stable name and use `{id}_{type}.json`
/// (`new_{type}.json` before they have an id); everything else uses
/// `{name}.json`, falling back to the id.
pub fn snapshot_filename(kind: ResourceKind, document: &ResourceDocument) -> String {
    let stem = match kind {
        ResourceKind::BranchPolicy => {
            let type_name = document.type_name().unwrap_or("policy");
            match document.id() {
                Some(id) => format!("{}_{}", id, type_name),
                None => format!("new_{}", type_name),
            }
        }
        _ => match (document.name(), document.id()) {
            (Some(name), _) => name.to_string(),
            (None, Some(id)) => id.to_string(),
            (None, None) => "unnamed".to_string(),
        },
    };
    format!("{}.json", sanitize_filename(&stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: serde_json::Value) -> ResourceDocument {
        ResourceDocument::from_value(value).unwrap()
    }

    #[test]
    fn test_sanitize_filename_collapses_runs() {
        assert_eq!(sanitize_filename("CI / Deploy (prod)"), "CI_Deploy_prod_");
        assert_eq!(sanitize_filename("ok-name_1.2"), "ok-name_1.2");
        assert_eq!(sanitize_filename("a\\b"), "a_b");
    }

    #[test]
    fn test_policy_filenames() {
        let existing = doc(json!({"id": 12, "type": {"displayName": "Minimum number of reviewers"}}));
        assert_eq!(
            snapshot_filename(ResourceKind::BranchPolicy, &existing),
            "12_Minimum_number_of_reviewers.json"
        );

        let fresh = doc(json!({"type": {"displayName": "Build"}}));
        assert_eq!(snapshot_filename(ResourceKind::BranchPolicy, &fresh), "new_Build.json");
    }

    #[test]
    fn test_named_filename() {
        let d = doc(json!({"id": 3, "name": "Web CI"}));
        assert_eq!(snapshot_filename(ResourceKind::BuildDefinition, &d), "Web_CI.json");
    }

    #[test]
    fn test_write_creates_dir_and_read_all_sorted() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("org").join("proj").join("wikis"));
        assert!(!store.exists());

        store.write("b.json", &doc(json!({"name": "b"}))).unwrap();
        store.write("a.json", &doc(json!({"name": "a"}))).unwrap();
        fs::create_dir_all(store.dir().join("a.wiki.git")).unwrap();
        fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        let files = store.read_all().unwrap();
        let names: Vec<_> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_missing_dir_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("absent"));
        assert!(store.read_all().unwrap_err().is_not_found());
    }

    #[test]
    fn test_load_selected_filters() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        store.write("Foo.json", &doc(json!({"id": 1, "name": "Foo"}))).unwrap();
        store.write("Bar.json", &doc(json!({"id": 2, "name": "Bar"}))).unwrap();

        let all = store.load_selected(&SelectionSet::parse(["ALL"])).unwrap();
        assert_eq!(all.len(), 2);

        let foo = store.load_selected(&SelectionSet::parse(["Foo"])).unwrap();
        assert_eq!(foo.len(), 1);
        assert_eq!(foo[0].label(), "Foo");

        let by_file = store.load_selected(&SelectionSet::parse(["Bar.json"])).unwrap();
        assert_eq!(by_file[0].document.name(), Some("Bar"));

        let by_id = store.load_selected(&SelectionSet::parse(["2"])).unwrap();
        assert_eq!(by_id[0].document.name(), Some("Bar"));

        let wrong_case = store.load_selected(&SelectionSet::parse(["foo"])).unwrap();
        assert!(wrong_case.is_empty());
    }

    #[test]
    fn test_malformed_snapshot_is_fatal_even_if_unselected() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        store.write("Foo.json", &doc(json!({"name": "Foo"}))).unwrap();
        fs::write(temp.path().join("Broken.json"), "{ not json").unwrap();

        let err = store.load_selected(&SelectionSet::parse(["Foo"])).unwrap_err();
        assert!(matches!(err, VaultError::MalformedSnapshot { .. }));
    }
}
