//! Persisted record shapes for uploads, candidate items and their tags.
//!
//! Column names are snake_case, status values are lower snake_case and
//! metadata keys are camelCase, matching the rows already stored by the
//! review application.

pub mod item;
pub mod metadata;
pub mod tag;
pub mod upload;

use chrono::{DateTime, SecondsFormat, Utc};

pub use item::{ItemStatus, MenuUploadItem, NewMenuUploadItem};
pub use metadata::{AiMetrics, Metadata};
pub use tag::{IdentifiedTag, TagSource};
pub use upload::{MenuUpload, NewMenuUpload, UploadStatus};

/// Formats a timestamp the way metadata timestamps are stored
/// (`2026-01-01T12:00:00.000Z`).
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a stored timestamp, accepting any RFC 3339 offset.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
