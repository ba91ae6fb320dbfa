//! Promote/discard transitions for candidate items.
//!
//! Called by the review endpoints after they have decided the actor may act;
//! nothing here checks permissions. Neither action touches the upload's
//! status, so an upload never becomes `completed` through this module.

use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::activity::{
    append_activity_event, record_item_action, ActivityEvent, ActivityEventType, AuditAction,
    AuditEntry,
};
use crate::model::metadata::{resolve_restaurant_id, KEY_OVERRIDES};
use crate::model::{format_timestamp, ItemStatus, MenuUpload, MenuUploadItem, Metadata};
use crate::store::{ItemUpdate, MenuStore, StoreError, UploadUpdate};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Menu upload item {item_id} not found on upload {upload_id}")]
    ItemNotFound { upload_id: i64, item_id: i64 },

    #[error("Cannot {action} item {item_id}: status is {status}")]
    InvalidTransition {
        item_id: i64,
        action: &'static str,
        status: ItemStatus,
    },

    #[error("Menu upload {0} has no restaurant context")]
    MissingRestaurantContext(i64),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Who performed a review action, as recorded in audit entries and events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub id: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub item: MenuUploadItem,
    pub upload: MenuUpload,
}

pub async fn discard_item(
    store: &dyn MenuStore,
    upload: &MenuUpload,
    item_id: i64,
    actor: &Actor,
) -> Result<ReviewOutcome, ReviewError> {
    transition(store, upload, item_id, actor, AuditAction::Discarded, None).await
}

/// Marks the item `completed` and records `overrides` (reviewer edits such
/// as a corrected name or price). Creating the live menu entry is the
/// caller's job.
pub async fn promote_item(
    store: &dyn MenuStore,
    upload: &MenuUpload,
    item_id: i64,
    actor: &Actor,
    overrides: Option<Metadata>,
) -> Result<ReviewOutcome, ReviewError> {
    transition(store, upload, item_id, actor, AuditAction::Promoted, overrides).await
}

async fn transition(
    store: &dyn MenuStore,
    upload: &MenuUpload,
    item_id: i64,
    actor: &Actor,
    action: AuditAction,
    overrides: Option<Metadata>,
) -> Result<ReviewOutcome, ReviewError> {
    let restaurant_id =
        resolve_restaurant_id(upload).ok_or(ReviewError::MissingRestaurantContext(upload.id))?;

    let item = store
        .get_menu_upload_items(upload.id)
        .await?
        .into_iter()
        .find(|i| i.id == item_id)
        .ok_or(ReviewError::ItemNotFound {
            upload_id: upload.id,
            item_id,
        })?;

    let (next_status, event_type) = match action {
        AuditAction::Promoted => (ItemStatus::Completed, ActivityEventType::ItemPromoted),
        AuditAction::Discarded => (ItemStatus::Discarded, ActivityEventType::ItemDiscarded),
    };

    if !item.status.is_reviewable() {
        return Err(ReviewError::InvalidTransition {
            item_id,
            action: match action {
                AuditAction::Promoted => "promote",
                AuditAction::Discarded => "discard",
            },
            status: item.status,
        });
    }

    let now = format_timestamp(Utc::now());
    let entry = AuditEntry {
        action,
        at: now.clone(),
        actor_id: actor.id.clone(),
        actor_email: actor.email.clone(),
        reason: None,
    };
    let mut item_metadata = record_item_action(&item.metadata, &entry);
    let overrides_value = overrides.map(Value::Object);
    if let Some(ref value) = overrides_value {
        item_metadata.insert(KEY_OVERRIDES.to_string(), value.clone());
    }

    let item = store
        .update_menu_upload_item(
            item_id,
            ItemUpdate {
                status: Some(next_status),
                metadata: Some(item_metadata),
            },
        )
        .await?;

    let mut event = ActivityEvent::new(event_type, now, upload.id, restaurant_id);
    event.menu_id = item.menu_id.or(upload.menu_id);
    event.item_id = Some(item.id);
    event.item_name = item.name.clone();
    event.actor_id = actor.id.clone();
    event.actor_email = actor.email.clone();
    if let Some(value) = overrides_value {
        event.payload = json!({ "overrides": value });
    }

    // Append to the freshest copy of the log; the caller's upload may be stale.
    let latest_metadata = store
        .get_menu_upload_by_id(upload.id)
        .await?
        .map(|u| u.metadata)
        .unwrap_or_else(|| upload.metadata.clone());
    let upload = store
        .update_menu_upload(
            upload.id,
            UploadUpdate {
                metadata: Some(append_activity_event(&latest_metadata, &event)),
                ..Default::default()
            },
        )
        .await?;

    info!(
        upload_id = upload.id,
        item_id = item.id,
        action = action.as_str(),
        "Review action recorded"
    );

    Ok(ReviewOutcome { item, upload })
}
