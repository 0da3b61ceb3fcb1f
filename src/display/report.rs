//! Run report formatting
//!
//! One table row per object, warnings folded into the detail column, and
//! the one-line summary underneath.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::backup::{ObjectReport, RunReport};

/// Longest detail cell before truncation
const DETAIL_WIDTH: usize = 80;

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Object")]
    label: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&ObjectReport> for ReportRow {
    fn from(object: &ObjectReport) -> Self {
        let mut lines = vec![truncate(&object.outcome.detail(), DETAIL_WIDTH)];
        lines.extend(
            object
                .warnings
                .iter()
                .map(|w| format!("warning: {}", truncate(w, DETAIL_WIDTH))),
        );
        lines.retain(|line| !line.is_empty());
        Self {
            label: object.label.clone(),
            status: object.outcome.status(),
            detail: lines.join("\n"),
        }
    }
}

/// Format a run report as a table followed by its summary
pub fn format_run_report(report: &RunReport) -> String {
    if report.objects.is_empty() {
        return format!("No {} selected.\n{}", report.kind.plural(), report.summary());
    }
    let rows: Vec<ReportRow> = report.objects.iter().map(ReportRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::psql());
    format!("{}\n\n{}", table, report.summary())
}

/// Truncate a string to a maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".chars().take(max_len).collect()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
