//! Core data models for azdo-vault
//!
//! Objects are handled as open documents with a few typed lenses; the
//! remaining types describe where objects live (`Scope`), what they are
//! (`ResourceKind`), which ones a run touches (`SelectionSet`), and the
//! side-channel facts captured at backup time (`BackupHints`).

pub mod document;
pub mod hints;
pub mod ids;
pub mod kind;
pub mod scope;
pub mod selection;
pub mod summary;

pub use document::ResourceDocument;
pub use hints::{BackupHints, IdentityHint, HINTS_KEY};
pub use ids::ObjectId;
pub use kind::ResourceKind;
pub use scope::Scope;
pub use selection::SelectionSet;
pub use summary::ObjectSummary;
