//! Helpers for the open `metadata` JSON object carried by uploads and items.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ai::TokenUsage;

use super::MenuUpload;

/// Open JSON object stored in the `metadata` column.
pub type Metadata = Map<String, Value>;

pub const KEY_AI_SUMMARY: &str = "aiSummary";
pub const KEY_AI_WARNINGS: &str = "aiWarnings";
pub const KEY_AI_MODEL: &str = "aiModel";
pub const KEY_AI_TOKEN_USAGE: &str = "aiTokenUsage";
pub const KEY_AI_EXTRACTION_SOURCE: &str = "aiExtractionSource";
pub const KEY_AI_ITEM_COUNT: &str = "aiItemCount";
pub const KEY_AI_METRICS: &str = "aiMetrics";
pub const KEY_PROCESSING_STARTED_AT: &str = "processingStartedAt";
pub const KEY_LAST_PROCESSED_AT: &str = "lastProcessedAt";
pub const KEY_ACTIVITY_LOG: &str = "activityLog";

// Hints supplied by the uploader.
pub const KEY_RESTAURANT_NAME: &str = "restaurantName";
pub const KEY_MENU_NAME: &str = "menuName";
pub const KEY_LOCALE: &str = "locale";

pub const KEY_AUDIT_TRAIL: &str = "auditTrail";
pub const KEY_LAST_ACTION: &str = "lastAction";
pub const KEY_LAST_ACTION_AT: &str = "lastActionAt";
pub const KEY_OVERRIDES: &str = "overrides";

/// Per-run metrics stored under `aiMetrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMetrics {
    pub last_run_at: String,
    pub last_duration_ms: u64,
    pub last_items_processed: usize,
    pub last_token_usage: Option<TokenUsage>,
}

/// Resolves the restaurant an upload belongs to.
///
/// A positive column value wins; otherwise a numeric `restaurantId` or
/// `restaurant_id` in metadata is accepted, either as a JSON number or a
/// numeric string. Ids must be greater than zero wherever they come from.
pub fn resolve_restaurant_id(upload: &MenuUpload) -> Option<i64> {
    upload.restaurant_id.filter(|id| *id > 0).or_else(|| {
        ["restaurantId", "restaurant_id"]
            .iter()
            .find_map(|key| upload.metadata.get(*key).and_then(value_as_id))
    })
}

fn value_as_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}

/// Returns a trimmed, non-empty string stored under `key`.
pub fn hint<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
