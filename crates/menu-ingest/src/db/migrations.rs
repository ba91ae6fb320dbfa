//! Schema migrations for the menu database.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration
//! runs in its own transaction together with its bookkeeping row, so a
//! failed script leaves the database at the previous version.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_menu_uploads_table",
        sql: include_str!("sql/001_create_menu_uploads.sql"),
    },
    Migration {
        version: 2,
        description: "create_menu_upload_items_table",
        sql: include_str!("sql/002_create_menu_upload_items.sql"),
    },
];

/// Highest applied version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

/// Applies every migration newer than [`current_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    apply_pending(conn, MIGRATIONS)
}

fn apply_pending(conn: &Connection, migrations: &[Migration]) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let from = current_version(conn)?;
    let pending: Vec<&Migration> = migrations.iter().filter(|m| m.version > from).collect();
    if pending.is_empty() {
        tracing::debug!(version = from, "Schema is up to date");
    }
    for migration in pending {
        apply(conn, migration)?;
    }
    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    tracing::info!(
        version = migration.version,
        description = migration.description,
        "Applying migration"
    );

    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: migration.version,
        reason: e.to_string(),
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    tx.execute_batch(migration.sql).map_err(failed)?;
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.description],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        conn
    }

    fn has_table(conn: &Connection, name: &str) -> bool {
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .unwrap()
            .exists([name])
            .unwrap()
    }

    #[test]
    fn test_fresh_database_reaches_latest_version() {
        let conn = fresh();
        run_all(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), 2);
        assert!(has_table(&conn, "menu_uploads"));
        assert!(has_table(&conn, "menu_upload_items"));
    }

    #[test]
    fn test_only_newer_versions_are_applied() {
        let conn = fresh();
        apply_pending(&conn, &MIGRATIONS[..1]).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);
        assert!(!has_table(&conn, "menu_upload_items"));

        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let versions: Vec<u32> = conn
            .prepare("SELECT version FROM _migrations ORDER BY version")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_failed_migration_is_rolled_back() {
        let conn = fresh();
        let broken = [Migration {
            version: 1,
            description: "half_applied",
            sql: "CREATE TABLE scratch (id INTEGER); INSERT INTO missing VALUES (1);",
        }];

        let err = apply_pending(&conn, &broken).unwrap_err();

        assert!(matches!(err, DatabaseError::Migration { version: 1, .. }));
        assert_eq!(current_version(&conn).unwrap(), 0);
        assert!(!has_table(&conn, "scratch"));
    }

    #[test]
    fn test_items_require_existing_upload() {
        let conn = fresh();
        run_all(&conn).unwrap();

        let orphan = conn.execute(
            "INSERT INTO menu_upload_items (upload_id, created_at, updated_at)
             VALUES (999, '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')",
            [],
        );
        assert!(orphan.is_err());
    }
}
