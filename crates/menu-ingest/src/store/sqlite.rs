use async_trait::async_trait;
use chrono::Utc;

use super::{ItemUpdate, MenuStore, StoreError, UploadFilter, UploadUpdate};
use crate::db::item_repo::{self, ItemRow};
use crate::db::upload_repo::{self, UploadQuery, UploadRow};
use crate::db::Database;
use crate::model::{format_timestamp, MenuUpload, MenuUploadItem, NewMenuUpload, NewMenuUploadItem};

/// [`MenuStore`] over the rusqlite [`Database`].
///
/// Updates are read-modify-write without a transaction; last writer wins.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn load_upload(&self, id: i64) -> Result<MenuUpload, StoreError> {
        upload_repo::find_by_id(&self.db, id)?
            .ok_or(StoreError::UploadNotFound(id))?
            .into_upload()
            .map_err(StoreError::from)
    }

    fn load_item(&self, id: i64) -> Result<MenuUploadItem, StoreError> {
        item_repo::find_by_id(&self.db, id)?
            .ok_or(StoreError::ItemNotFound(id))?
            .into_item()
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl MenuStore for SqliteStore {
    async fn insert_menu_upload(&self, upload: NewMenuUpload) -> Result<MenuUpload, StoreError> {
        let now = format_timestamp(Utc::now());
        let id = upload_repo::insert(&self.db, &upload, &now)?;
        tracing::debug!(upload_id = id, "Inserted menu upload");
        self.load_upload(id)
    }

    async fn get_menu_upload_by_id(&self, id: i64) -> Result<Option<MenuUpload>, StoreError> {
        match upload_repo::find_by_id(&self.db, id)? {
            Some(row) => Ok(Some(row.into_upload()?)),
            None => Ok(None),
        }
    }

    async fn get_menu_uploads(&self, filter: &UploadFilter) -> Result<Vec<MenuUpload>, StoreError> {
        let query = UploadQuery {
            status: filter.status.map(|s| s.as_str().to_string()),
            limit: filter.limit.map(|l| l as u64),
        };
        upload_repo::query(&self.db, &query)?
            .into_iter()
            .map(|row| row.into_upload().map_err(StoreError::from))
            .collect()
    }

    async fn update_menu_upload(
        &self,
        id: i64,
        update: UploadUpdate,
    ) -> Result<MenuUpload, StoreError> {
        let mut upload = self.load_upload(id)?;
        if update.is_empty() {
            return Ok(upload);
        }
        update.apply(&mut upload);
        upload.updated_at = Utc::now();

        let row = UploadRow::from_upload(&upload)?;
        if upload_repo::update(&self.db, &row)? == 0 {
            return Err(StoreError::UploadNotFound(id));
        }
        self.load_upload(id)
    }

    async fn get_menu_upload_items(
        &self,
        upload_id: i64,
    ) -> Result<Vec<MenuUploadItem>, StoreError> {
        item_repo::list_by_upload(&self.db, upload_id)?
            .into_iter()
            .map(|row| row.into_item().map_err(StoreError::from))
            .collect()
    }

    async fn create_menu_upload_item(
        &self,
        item: NewMenuUploadItem,
    ) -> Result<MenuUploadItem, StoreError> {
        let now = format_timestamp(Utc::now());
        let id = item_repo::insert(&self.db, &item, &now)?;
        self.load_item(id)
    }

    async fn update_menu_upload_item(
        &self,
        id: i64,
        update: ItemUpdate,
    ) -> Result<MenuUploadItem, StoreError> {
        let mut item = self.load_item(id)?;
        update.apply(&mut item);
        item.updated_at = Utc::now();

        let row = ItemRow::from_item(&item)?;
        if item_repo::update(&self.db, &row)? == 0 {
            return Err(StoreError::ItemNotFound(id));
        }
        self.load_item(id)
    }
}
