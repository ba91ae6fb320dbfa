use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IdentifiedTag, Metadata};

/// Lifecycle of a single AI-suggested dish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    NeedsReview,
    /// Promoted into a live menu item. Terminal.
    Completed,
    /// Rejected by a reviewer or superseded by reprocessing. Terminal.
    Discarded,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::NeedsReview => "needs_review",
            Self::Completed => "completed",
            Self::Discarded => "discarded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "needs_review" => Some(Self::NeedsReview),
            "completed" => Some(Self::Completed),
            "discarded" => Some(Self::Discarded),
            _ => None,
        }
    }

    /// Still awaiting a human decision.
    pub fn is_reviewable(&self) -> bool {
        matches!(self, Self::Pending | Self::NeedsReview)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One AI-suggested dish extracted from an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuUploadItem {
    pub id: i64,
    pub upload_id: i64,
    pub restaurant_id: Option<i64>,
    pub menu_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub raw_text: Option<String>,
    pub suggested_category: Option<String>,
    #[serde(default)]
    pub suggested_allergens: Vec<IdentifiedTag>,
    #[serde(default)]
    pub suggested_dietary: Vec<IdentifiedTag>,
    pub confidence: Option<f64>,
    /// Raw model output for this item, kept verbatim.
    #[serde(default)]
    pub ai_payload: serde_json::Value,
    pub status: ItemStatus,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `MenuStore::create_menu_upload_item`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMenuUploadItem {
    pub upload_id: i64,
    pub restaurant_id: Option<i64>,
    pub menu_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub raw_text: Option<String>,
    pub suggested_category: Option<String>,
    pub suggested_allergens: Vec<IdentifiedTag>,
    pub suggested_dietary: Vec<IdentifiedTag>,
    pub confidence: Option<f64>,
    pub ai_payload: serde_json::Value,
    pub status: ItemStatus,
    pub metadata: Metadata,
}
