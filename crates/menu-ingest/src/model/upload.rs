use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Metadata;

/// Lifecycle of an uploaded menu file.
///
/// The worker only ever moves an upload into `Processing` and from there to
/// `NeedsReview` or `Failed`. `Completed` is assigned by the review side once
/// every candidate has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Processing,
    NeedsReview,
    Failed,
    Completed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::NeedsReview => "needs_review",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "needs_review" => Some(Self::NeedsReview),
            "failed" => Some(Self::Failed),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded menu file and its processing lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuUpload {
    pub id: i64,
    /// Required for processing; may instead live in `metadata`.
    pub restaurant_id: Option<i64>,
    /// Target menu, when the upload has already been linked to one.
    pub menu_id: Option<i64>,
    pub file_url: String,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub resource_type: Option<String>,
    pub status: UploadStatus,
    pub parser_version: Option<String>,
    pub ai_model: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when registering a new upload.
#[derive(Debug, Clone, Default)]
pub struct NewMenuUpload {
    pub restaurant_id: Option<i64>,
    pub menu_id: Option<i64>,
    pub file_url: String,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub resource_type: Option<String>,
    pub metadata: Metadata,
}
