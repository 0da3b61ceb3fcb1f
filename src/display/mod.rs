//! Display formatting for terminal output

pub mod listing;
pub mod report;

pub use listing::{format_listing, format_packages, format_versions};
pub use report::format_run_report;
