//! Append-only journals kept inside metadata objects.
//!
//! Uploads carry an `activityLog` that the worker and the review endpoints
//! both append to; items carry an `auditTrail` of promote/discard actions.
//! Neither journal ever has an entry rewritten or removed, including entries
//! written by other producers that do not parse as events here.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::model::metadata::{
    KEY_ACTIVITY_LOG, KEY_AUDIT_TRAIL, KEY_LAST_ACTION, KEY_LAST_ACTION_AT,
};
use crate::model::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEventType {
    UploadReady,
    ItemPromoted,
    ItemDiscarded,
}

/// One entry of an upload's `activityLog`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    #[serde(rename = "type")]
    pub event_type: ActivityEventType,
    pub timestamp: String,
    pub upload_id: i64,
    pub restaurant_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

fn empty_payload() -> Value {
    json!({})
}

impl ActivityEvent {
    pub fn new(
        event_type: ActivityEventType,
        timestamp: String,
        upload_id: i64,
        restaurant_id: i64,
    ) -> Self {
        Self {
            event_type,
            timestamp,
            upload_id,
            restaurant_id,
            menu_id: None,
            item_id: None,
            item_name: None,
            actor_email: None,
            actor_id: None,
            item_count: None,
            payload: empty_payload(),
        }
    }
}

/// Ordered, append-only view of an `activityLog` array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityLog {
    entries: Vec<Value>,
}

impl ActivityLog {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            entries: existing_entries(metadata, KEY_ACTIVITY_LOG),
        }
    }

    pub fn append(&mut self, event: &ActivityEvent) {
        match serde_json::to_value(event) {
            Ok(value) => self.entries.push(value),
            Err(e) => warn!("Dropping unserializable activity event: {}", e),
        }
    }

    /// Entries that parse as [`ActivityEvent`], oldest first.
    pub fn events(&self) -> impl Iterator<Item = ActivityEvent> + '_ {
        self.entries
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn into_value(self) -> Value {
        Value::Array(self.entries)
    }
}

/// Returns a copy of `existing` with `event` appended to `activityLog`.
pub fn append_activity_event(existing: &Metadata, event: &ActivityEvent) -> Metadata {
    let mut log = ActivityLog::from_metadata(existing);
    log.append(event);

    let mut next = existing.clone();
    next.insert(KEY_ACTIVITY_LOG.to_string(), log.into_value());
    next
}

fn existing_entries(metadata: &Metadata, key: &str) -> Vec<Value> {
    match metadata.get(key) {
        Some(Value::Array(entries)) => entries.clone(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            warn!("Metadata key '{}' is not an array, wrapping it", key);
            vec![other.clone()]
        }
    }
}

// ─── Item audit trail ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Promoted,
    Discarded,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Promoted => "promoted",
            Self::Discarded => "discarded",
        }
    }
}

/// One entry of an item's `auditTrail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub action: AuditAction,
    pub at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Returns a copy of item metadata with `entry` appended to `auditTrail`
/// and `lastAction`/`lastActionAt` pointing at it.
pub fn record_item_action(existing: &Metadata, entry: &AuditEntry) -> Metadata {
    let mut trail = existing_entries(existing, KEY_AUDIT_TRAIL);
    match serde_json::to_value(entry) {
        Ok(value) => trail.push(value),
        Err(e) => warn!("Dropping unserializable audit entry: {}", e),
    }

    let mut next = existing.clone();
    next.insert(KEY_AUDIT_TRAIL.to_string(), Value::Array(trail));
    next.insert(
        KEY_LAST_ACTION.to_string(),
        Value::String(entry.action.as_str().to_string()),
    );
    next.insert(KEY_LAST_ACTION_AT.to_string(), Value::String(entry.at.clone()));
    next
}
