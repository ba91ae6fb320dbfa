//! CRUD for the `menu_upload_items` table.
//!
//! Tag lists, `ai_payload` and `metadata` are stored as JSON text columns.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::model::{
    format_timestamp, parse_timestamp, ItemStatus, MenuUploadItem, NewMenuUploadItem,
};

const TABLE: &str = "menu_upload_items";

/// A raw item row from the database.
#[derive(Debug, Clone)]
pub struct ItemRow {
    pub id: i64,
    pub upload_id: i64,
    pub restaurant_id: Option<i64>,
    pub menu_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub raw_text: Option<String>,
    pub suggested_category: Option<String>,
    pub suggested_allergens: String,
    pub suggested_dietary: String,
    pub confidence: Option<f64>,
    pub ai_payload: String,
    pub status: String,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            upload_id: row.get("upload_id")?,
            restaurant_id: row.get("restaurant_id")?,
            menu_id: row.get("menu_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            price: row.get("price")?,
            raw_text: row.get("raw_text")?,
            suggested_category: row.get("suggested_category")?,
            suggested_allergens: row.get("suggested_allergens")?,
            suggested_dietary: row.get("suggested_dietary")?,
            confidence: row.get("confidence")?,
            ai_payload: row.get("ai_payload")?,
            status: row.get("status")?,
            metadata: row.get("metadata")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn from_item(item: &MenuUploadItem) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: item.id,
            upload_id: item.upload_id,
            restaurant_id: item.restaurant_id,
            menu_id: item.menu_id,
            name: item.name.clone(),
            description: item.description.clone(),
            price: item.price,
            raw_text: item.raw_text.clone(),
            suggested_category: item.suggested_category.clone(),
            suggested_allergens: serde_json::to_string(&item.suggested_allergens)?,
            suggested_dietary: serde_json::to_string(&item.suggested_dietary)?,
            confidence: item.confidence,
            ai_payload: serde_json::to_string(&item.ai_payload)?,
            status: item.status.as_str().to_string(),
            metadata: serde_json::to_string(&item.metadata)?,
            created_at: format_timestamp(item.created_at),
            updated_at: format_timestamp(item.updated_at),
        })
    }

    pub fn into_item(self) -> Result<MenuUploadItem, DatabaseError> {
        let id = self.id;
        let invalid = |reason: String| DatabaseError::InvalidRow {
            table: TABLE,
            id,
            reason,
        };
        let timestamp = |value: &str| -> Result<DateTime<Utc>, DatabaseError> {
            parse_timestamp(value).ok_or_else(|| invalid(format!("bad timestamp '{}'", value)))
        };

        let status = ItemStatus::parse(&self.status)
            .ok_or_else(|| invalid(format!("unknown status '{}'", self.status)))?;
        let suggested_allergens = serde_json::from_str(&self.suggested_allergens)
            .map_err(|e| invalid(format!("suggested_allergens: {}", e)))?;
        let suggested_dietary = serde_json::from_str(&self.suggested_dietary)
            .map_err(|e| invalid(format!("suggested_dietary: {}", e)))?;
        let ai_payload = serde_json::from_str(&self.ai_payload)
            .map_err(|e| invalid(format!("ai_payload: {}", e)))?;
        let metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| invalid(format!("metadata is not a JSON object: {}", e)))?;

        Ok(MenuUploadItem {
            id,
            upload_id: self.upload_id,
            restaurant_id: self.restaurant_id,
            menu_id: self.menu_id,
            name: self.name,
            description: self.description,
            price: self.price,
            raw_text: self.raw_text,
            suggested_category: self.suggested_category,
            suggested_allergens,
            suggested_dietary,
            confidence: self.confidence,
            ai_payload,
            status,
            metadata,
            created_at: timestamp(&self.created_at)?,
            updated_at: timestamp(&self.updated_at)?,
        })
    }
}

/// Inserts a new item row, returning its id.
pub fn insert(db: &Database, item: &NewMenuUploadItem, now: &str) -> Result<i64, DatabaseError> {
    let allergens = serde_json::to_string(&item.suggested_allergens)?;
    let dietary = serde_json::to_string(&item.suggested_dietary)?;
    let ai_payload = serde_json::to_string(&item.ai_payload)?;
    let metadata = serde_json::to_string(&item.metadata)?;

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO menu_upload_items (upload_id, restaurant_id, menu_id, name, description,
             price, raw_text, suggested_category, suggested_allergens, suggested_dietary,
             confidence, ai_payload, status, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
            params![
                item.upload_id,
                item.restaurant_id,
                item.menu_id,
                item.name,
                item.description,
                item.price,
                item.raw_text,
                item.suggested_category,
                allergens,
                dietary,
                item.confidence,
                ai_payload,
                item.status.as_str(),
                metadata,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Updates the mutable lifecycle fields of an item: status, metadata, updated_at.
pub fn update(db: &Database, row: &ItemRow) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE menu_upload_items SET status=?2, metadata=?3, updated_at=?4 WHERE id=?1",
            params![row.id, row.status, row.metadata, row.updated_at],
        )?;
        Ok(changed)
    })
}

/// Finds an item by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<ItemRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM menu_upload_items WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ItemRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// All items of an upload in creation order.
pub fn list_by_upload(db: &Database, upload_id: i64) -> Result<Vec<ItemRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM menu_upload_items WHERE upload_id = ?1 ORDER BY id ASC")?;
        let rows: Vec<ItemRow> = stmt
            .query_map(params![upload_id], ItemRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::upload_repo;
    use crate::model::{IdentifiedTag, NewMenuUpload, TagSource};
    use serde_json::json;

    const NOW: &str = "2026-03-01T12:00:00.000Z";

    fn seed_upload(db: &Database) -> i64 {
        upload_repo::insert(
            db,
            &NewMenuUpload {
                restaurant_id: Some(44),
                file_url: "/uploads/menu.pdf".to_string(),
                ..Default::default()
            },
            NOW,
        )
        .unwrap()
    }

    fn new_item(upload_id: i64, name: &str) -> NewMenuUploadItem {
        NewMenuUploadItem {
            upload_id,
            restaurant_id: Some(44),
            menu_id: None,
            name: Some(name.to_string()),
            description: None,
            price: Some(6.5),
            raw_text: None,
            suggested_category: Some("Sides".to_string()),
            suggested_allergens: vec![IdentifiedTag {
                code: "gluten".to_string(),
                label: "Gluten".to_string(),
                confidence: Some(0.8),
                source: TagSource::Ai,
            }],
            suggested_dietary: Vec::new(),
            confidence: Some(0.9),
            ai_payload: json!({"name": name}),
            status: ItemStatus::Pending,
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_insert_and_round_trip_json_columns() {
        let db = Database::open_in_memory().unwrap();
        let upload_id = seed_upload(&db);

        let id = insert(&db, &new_item(upload_id, "Truffle Fries"), NOW).unwrap();
        let item = find_by_id(&db, id).unwrap().unwrap().into_item().unwrap();

        assert_eq!(item.name.as_deref(), Some("Truffle Fries"));
        assert_eq!(item.suggested_allergens.len(), 1);
        assert_eq!(item.suggested_allergens[0].code, "gluten");
        assert_eq!(item.suggested_allergens[0].source, TagSource::Ai);
        assert_eq!(item.ai_payload, json!({"name": "Truffle Fries"}));
        assert_eq!(item.status, ItemStatus::Pending);
    }

    #[test]
    fn test_list_by_upload_in_creation_order() {
        let db = Database::open_in_memory().unwrap();
        let upload_id = seed_upload(&db);
        let other_upload = seed_upload(&db);

        let first = insert(&db, &new_item(upload_id, "Soup"), NOW).unwrap();
        let second = insert(&db, &new_item(upload_id, "Bread"), NOW).unwrap();
        insert(&db, &new_item(other_upload, "Olives"), NOW).unwrap();

        let ids: Vec<i64> = list_by_upload(&db, upload_id)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn test_update_status_and_metadata() {
        let db = Database::open_in_memory().unwrap();
        let upload_id = seed_upload(&db);
        let id = insert(&db, &new_item(upload_id, "Soup"), NOW).unwrap();

        let mut row = find_by_id(&db, id).unwrap().unwrap();
        row.status = "discarded".to_string();
        row.metadata = r#"{"lastAction":"discarded"}"#.to_string();
        row.updated_at = "2026-03-01T12:01:00.000Z".to_string();
        assert_eq!(update(&db, &row).unwrap(), 1);

        let item = find_by_id(&db, id).unwrap().unwrap().into_item().unwrap();
        assert_eq!(item.status, ItemStatus::Discarded);
        assert_eq!(item.metadata["lastAction"], json!("discarded"));
        assert_eq!(item.name.as_deref(), Some("Soup"));
    }

    #[test]
    fn test_insert_for_missing_upload_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(insert(&db, &new_item(404, "Ghost"), NOW).is_err());
    }
}
