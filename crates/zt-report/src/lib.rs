//! Zero Trust assessment reports
//!
//! Renders scan results into a standalone HTML document and keeps the
//! documents in a directory the API serves them from.

#![warn(missing_docs)]

use chrono::{DateTime, SecondsFormat, Utc};

pub mod html;
pub mod store;

pub use html::HtmlReportRenderer;
pub use store::{is_valid_file_name, FileReportStore, REPORTS_PREFIX};

/// `<name>-<timestamp>.html` with the name reduced to `[A-Za-z0-9_-]`
pub fn report_file_name(name: &str, generated_at: DateTime<Utc>) -> String {
    format!("{}-{}.html", report_stem_name(name), report_timestamp(generated_at))
}

pub(crate) fn report_stem_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// RFC 3339 with millisecond precision, `:` and `.` replaced by `-`
pub(crate) fn report_timestamp(generated_at: DateTime<Utc>) -> String {
    generated_at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}
