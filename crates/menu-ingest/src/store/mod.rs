//! Record store seam.
//!
//! The worker, coordinator and review actions only ever talk to
//! [`MenuStore`]. [`SqliteStore`] is the shipped implementation.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::model::{
    ItemStatus, MenuUpload, MenuUploadItem, Metadata, NewMenuUpload, NewMenuUploadItem,
    UploadStatus,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Menu upload {0} not found")]
    UploadNotFound(i64),

    #[error("Menu upload item {0} not found")]
    ItemNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Partial update of an upload. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadUpdate {
    pub status: Option<UploadStatus>,
    /// `Some(None)` clears the stored reason.
    pub failure_reason: Option<Option<String>>,
    pub parser_version: Option<String>,
    pub ai_model: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Replaces the whole metadata object.
    pub metadata: Option<Metadata>,
}

impl UploadUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, upload: &mut MenuUpload) {
        if let Some(status) = self.status {
            upload.status = status;
        }
        if let Some(reason) = self.failure_reason {
            upload.failure_reason = reason;
        }
        if let Some(version) = self.parser_version {
            upload.parser_version = Some(version);
        }
        if let Some(model) = self.ai_model {
            upload.ai_model = Some(model);
        }
        if let Some(at) = self.processed_at {
            upload.processed_at = Some(at);
        }
        if let Some(metadata) = self.metadata {
            upload.metadata = metadata;
        }
    }
}

/// Partial update of an item's lifecycle fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub status: Option<ItemStatus>,
    pub metadata: Option<Metadata>,
}

impl ItemUpdate {
    pub fn apply(self, item: &mut MenuUploadItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(metadata) = self.metadata {
            item.metadata = metadata;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadFilter {
    pub status: Option<UploadStatus>,
    pub limit: Option<usize>,
}

impl UploadFilter {
    pub fn pending(limit: Option<usize>) -> Self {
        Self {
            status: Some(UploadStatus::Pending),
            limit,
        }
    }
}

#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn insert_menu_upload(&self, upload: NewMenuUpload) -> Result<MenuUpload, StoreError>;

    async fn get_menu_upload_by_id(&self, id: i64) -> Result<Option<MenuUpload>, StoreError>;

    /// Matching uploads, oldest first.
    async fn get_menu_uploads(&self, filter: &UploadFilter) -> Result<Vec<MenuUpload>, StoreError>;

    async fn update_menu_upload(
        &self,
        id: i64,
        update: UploadUpdate,
    ) -> Result<MenuUpload, StoreError>;

    /// Items of an upload in creation order.
    async fn get_menu_upload_items(&self, upload_id: i64)
        -> Result<Vec<MenuUploadItem>, StoreError>;

    async fn create_menu_upload_item(
        &self,
        item: NewMenuUploadItem,
    ) -> Result<MenuUploadItem, StoreError>;

    async fn update_menu_upload_item(
        &self,
        id: i64,
        update: ItemUpdate,
    ) -> Result<MenuUploadItem, StoreError>;
}
