//! Storage layer for azdo-vault
//!
//! Snapshots are plain JSON files, one per object, grouped in a directory
//! per resource kind. Writes are atomic.

pub mod file_io;
pub mod snapshots;

pub use file_io::{read_json, write_json_atomic};
pub use snapshots::{sanitize_filename, snapshot_filename, Snapshot, SnapshotStore};
