//! SQLite persistence for menu uploads and their candidate items.
//!
//! One rusqlite connection behind a mutex; the repos borrow it through
//! [`Database::with_conn`]. Schema changes live in `sql/` and are applied by
//! [`migrations::run_all`] whenever a database is opened.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod item_repo;
pub mod migrations;
pub mod upload_repo;

pub use error::DatabaseError;

/// How long a statement waits on a lock held by another process (for example
/// a review endpoint writing to the same file).
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the menu database. Clones share the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Opens the database file, creating it and its parent directories when
    /// missing, and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self::prepare(conn)?;

        tracing::info!(path = %crate::sanitize::redact_path(path), "Menu database ready");
        Ok(db)
    }

    /// Private in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        // Item rows cascade with their upload.
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(db: &Database, table: &str) -> u32 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get(0)
            })?)
        })
        .unwrap()
    }

    fn insert_upload(db: &Database) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO menu_uploads (file_url, created_at, updated_at)
                 VALUES ('/tmp/a.pdf', '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_in_memory_has_schema() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(count(&db, "menu_uploads"), 0);
        assert_eq!(count(&db, "menu_upload_items"), 0);
    }

    #[test]
    fn test_open_creates_parent_dirs_and_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("menu-ingest.db");

        insert_upload(&Database::open(&path).unwrap());
        assert!(path.exists());

        let reopened = Database::open(&path).unwrap();
        assert_eq!(count(&reopened, "menu_uploads"), 1);
    }

    #[test]
    fn test_deleting_upload_cascades_to_items() {
        let db = Database::open_in_memory().unwrap();
        insert_upload(&db);
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO menu_upload_items (upload_id, created_at, updated_at)
                 VALUES (1, '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')",
                [],
            )?;
            conn.execute("DELETE FROM menu_uploads WHERE id = 1", [])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(count(&db, "menu_upload_items"), 0);
    }
}
