//! CRUD for the `menu_uploads` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::model::{format_timestamp, parse_timestamp, MenuUpload, NewMenuUpload, UploadStatus};

const TABLE: &str = "menu_uploads";

/// A raw upload row from the database.
#[derive(Debug, Clone)]
pub struct UploadRow {
    pub id: i64,
    pub restaurant_id: Option<i64>,
    pub menu_id: Option<i64>,
    pub file_url: String,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub resource_type: Option<String>,
    pub status: String,
    pub parser_version: Option<String>,
    pub ai_model: Option<String>,
    pub processed_at: Option<String>,
    pub failure_reason: Option<String>,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UploadRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            restaurant_id: row.get("restaurant_id")?,
            menu_id: row.get("menu_id")?,
            file_url: row.get("file_url")?,
            file_name: row.get("file_name")?,
            file_size: row.get("file_size")?,
            resource_type: row.get("resource_type")?,
            status: row.get("status")?,
            parser_version: row.get("parser_version")?,
            ai_model: row.get("ai_model")?,
            processed_at: row.get("processed_at")?,
            failure_reason: row.get("failure_reason")?,
            metadata: row.get("metadata")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn from_upload(upload: &MenuUpload) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: upload.id,
            restaurant_id: upload.restaurant_id,
            menu_id: upload.menu_id,
            file_url: upload.file_url.clone(),
            file_name: upload.file_name.clone(),
            file_size: upload.file_size,
            resource_type: upload.resource_type.clone(),
            status: upload.status.as_str().to_string(),
            parser_version: upload.parser_version.clone(),
            ai_model: upload.ai_model.clone(),
            processed_at: upload.processed_at.map(format_timestamp),
            failure_reason: upload.failure_reason.clone(),
            metadata: serde_json::to_string(&upload.metadata)?,
            created_at: format_timestamp(upload.created_at),
            updated_at: format_timestamp(upload.updated_at),
        })
    }

    pub fn into_upload(self) -> Result<MenuUpload, DatabaseError> {
        let id = self.id;
        let invalid = |reason: String| DatabaseError::InvalidRow {
            table: TABLE,
            id,
            reason,
        };
        let timestamp = |value: &str| -> Result<DateTime<Utc>, DatabaseError> {
            parse_timestamp(value).ok_or_else(|| invalid(format!("bad timestamp '{}'", value)))
        };

        let status = UploadStatus::parse(&self.status)
            .ok_or_else(|| invalid(format!("unknown status '{}'", self.status)))?;
        let metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| invalid(format!("metadata is not a JSON object: {}", e)))?;
        let processed_at = self.processed_at.as_deref().map(timestamp).transpose()?;

        Ok(MenuUpload {
            id,
            restaurant_id: self.restaurant_id,
            menu_id: self.menu_id,
            file_url: self.file_url,
            file_name: self.file_name,
            file_size: self.file_size,
            resource_type: self.resource_type,
            status,
            parser_version: self.parser_version,
            ai_model: self.ai_model,
            processed_at,
            failure_reason: self.failure_reason,
            metadata,
            created_at: timestamp(&self.created_at)?,
            updated_at: timestamp(&self.updated_at)?,
        })
    }
}

/// Query filter for upload listing. Results are oldest first.
#[derive(Debug, Default, Clone)]
pub struct UploadQuery {
    pub status: Option<String>,
    pub limit: Option<u64>,
}

/// Inserts a new upload with status `pending`, returning its id.
pub fn insert(db: &Database, upload: &NewMenuUpload, now: &str) -> Result<i64, DatabaseError> {
    let metadata = serde_json::to_string(&upload.metadata)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO menu_uploads (restaurant_id, menu_id, file_url, file_name, file_size,
             resource_type, status, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                upload.restaurant_id,
                upload.menu_id,
                upload.file_url,
                upload.file_name,
                upload.file_size,
                upload.resource_type,
                UploadStatus::Pending.as_str(),
                metadata,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Updates an existing upload row. All fields except `id` and `created_at` are overwritten.
pub fn update(db: &Database, row: &UploadRow) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE menu_uploads SET restaurant_id=?2, menu_id=?3, file_url=?4, file_name=?5,
             file_size=?6, resource_type=?7, status=?8, parser_version=?9, ai_model=?10,
             processed_at=?11, failure_reason=?12, metadata=?13, updated_at=?14
             WHERE id=?1",
            params![
                row.id,
                row.restaurant_id,
                row.menu_id,
                row.file_url,
                row.file_name,
                row.file_size,
                row.resource_type,
                row.status,
                row.parser_version,
                row.ai_model,
                row.processed_at,
                row.failure_reason,
                row.metadata,
                row.updated_at,
            ],
        )?;
        Ok(changed)
    })
}

/// Finds an upload by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<UploadRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM menu_uploads WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], UploadRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists uploads matching the query, oldest first.
pub fn query(db: &Database, filter: &UploadQuery) -> Result<Vec<UploadRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        let where_clause = match filter.status {
            Some(ref status) => {
                param_values.push(Box::new(status.clone()));
                "WHERE status = ?1".to_string()
            }
            None => String::new(),
        };

        // SQLite treats a negative LIMIT as unbounded.
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        param_values.push(Box::new(limit));
        let query_sql = format!(
            "SELECT * FROM menu_uploads {} ORDER BY created_at ASC, id ASC LIMIT ?{}",
            where_clause,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<UploadRow> = stmt
            .query_map(params_ref.as_slice(), UploadRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    })
}
