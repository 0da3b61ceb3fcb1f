//! Scope listing formatting

use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::report::truncate;
use crate::models::{ObjectSummary, ResourceDocument, ResourceKind};

#[derive(Tabled)]
struct ListingRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
}

/// Format the live objects of one kind
pub fn format_listing(kind: ResourceKind, summaries: &[ObjectSummary]) -> String {
    if summaries.is_empty() {
        return format!("No {} found.", kind.plural());
    }

    let rows: Vec<ListingRow> = summaries
        .iter()
        .map(|s| ListingRow {
            id: s.id.to_string(),
            name: truncate(&s.name, 60),
            kind: s.record.type_name().unwrap_or_default().to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::psql());
    format!("{}\n\nTotal: {}", table, summaries.len())
}

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Protocol")]
    protocol: String,
    #[tabled(rename = "Latest")]
    latest: String,
}

#[derive(Tabled)]
struct VersionRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Listed")]
    listed: &'static str,
}

/// Latest version recorded inline on a package listing entry
fn latest_version(package: &ResourceDocument) -> String {
    let versions = package.get("versions").and_then(|v| v.as_array());
    versions
        .and_then(|vs| {
            vs.iter()
                .find(|v| v.get("isLatest").and_then(|l| l.as_bool()).unwrap_or(false))
                .or_else(|| vs.first())
        })
        .and_then(|v| v.get("version"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Format the packages of one feed
pub fn format_packages(feed: &str, packages: &[ResourceDocument]) -> String {
    if packages.is_empty() {
        return format!("No packages found in feed '{}'.", feed);
    }

    let rows: Vec<PackageRow> = packages
        .iter()
        .map(|p| PackageRow {
            id: p.id().map(|id| id.to_string()).unwrap_or_default(),
            name: truncate(p.name().unwrap_or_default(), 60),
            protocol: p.str_at("/protocolType").unwrap_or_default().to_string(),
            latest: latest_version(p),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::psql());
    format!("{}\n\nTotal: {}", table, packages.len())
}

/// Format the versions of one package
pub fn format_versions(package: &str, versions: &[ResourceDocument]) -> String {
    if versions.is_empty() {
        return format!("No versions found for package '{}'.", package);
    }

    let rows: Vec<VersionRow> = versions
        .iter()
        .map(|v| VersionRow {
            id: v.id().map(|id| id.to_string()).unwrap_or_default(),
            version: v.str_at("/version").unwrap_or_default().to_string(),
            listed: match v.get("isListed").and_then(|l| l.as_bool()) {
                Some(false) => "no",
                _ => "yes",
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::psql());
    format!("{}\n\nTotal: {}", table, versions.len())
}
