//! Versioned database migrations.
//!
//! Migrations run sequentially from the current stored version to the latest.
//! Version 1 is destructive (it rebuilds the document and password tables);
//! every later version only adds.

use rusqlite::Connection;
use tracing::{info, warn};
use vault_core::constants::DB_SCHEMA_VERSION;
use vault_core::error::{VaultError, VaultResult};

use crate::schema;

/// Run all pending migrations on the database.
///
/// A step's schema changes and its version bump share one transaction.
pub fn run_migrations(conn: &Connection) -> VaultResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= DB_SCHEMA_VERSION {
        info!("database schema is up to date (version {current_version})");
        return Ok(());
    }

    info!("running migrations from version {current_version} to {DB_SCHEMA_VERSION}");

    // Each step commits with its version so a failure resumes where it stopped.
    for version in (current_version + 1)..=DB_SCHEMA_VERSION {
        run_migration(conn, version)?;
    }

    info!("migrations complete, schema at version {DB_SCHEMA_VERSION}");
    Ok(())
}

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> VaultResult<i32> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| VaultError::Database(e.to_string()))?;

    if count == 0 {
        // First run
        conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])
            .map_err(|e| VaultError::Database(e.to_string()))?;
        return Ok(0);
    }

    conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })
    .map_err(|e| VaultError::Database(e.to_string()))
}

fn run_migration(conn: &Connection, version: i32) -> VaultResult<()> {
    info!("applying migration version {version}");

    let sql = match version {
        1 => schema::V1_SQL,
        2 => schema::V2_SQL,
        3 => schema::V3_SQL,
        4 => schema::V4_SQL,
        _ => {
            warn!("unknown migration version {version}, skipping");
            return Ok(());
        }
    };

    conn.execute_batch(&format!(
        "BEGIN;\n{sql}\nUPDATE schema_version SET version = {version};\nCOMMIT;"
    ))
        .map_err(|e| {
            let _ = conn.execute_batch("ROLLBACK;");
            VaultError::Migration(format!("migration v{version} failed: {e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_on_fresh_db() {
        let conn = migrated();
        assert_eq!(get_schema_version(&conn).unwrap(), DB_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO documents (title, category, timestamp) VALUES ('kept', 'text', 1)",
            [],
        )
        .unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1, "re-running migrations must not rebuild documents");
    }

    #[test]
    fn test_failed_step_keeps_previous_version() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        get_schema_version(&conn).unwrap();
        run_migration(&conn, 1).unwrap();
        // A column V2 adds already exists, so V2 fails part way through.
        conn.execute("ALTER TABLE documents ADD COLUMN attachment_name TEXT", [])
            .unwrap();

        let err = run_migrations(&conn).unwrap_err();
        assert!(matches!(err, VaultError::Migration(_)));
        assert_eq!(get_schema_version(&conn).unwrap(), 1);

        let has_uri: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('documents') WHERE name = 'attachment_uri'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(has_uri, 0, "partial V2 changes must roll back with the version");
    }

    #[test]
    fn test_upgrade_from_v1_keeps_documents() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        get_schema_version(&conn).unwrap();
        run_migration(&conn, 1).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        conn.execute(
            "INSERT INTO documents (title, category, timestamp) VALUES ('old', 'sms', 5)",
            [],
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let (title, uri): (String, Option<String>) = conn
            .query_row(
                "SELECT title, attachment_uri FROM documents",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(title, "old");
        assert!(uri.is_none());
    }

    #[test]
    fn test_unique_provider_key() {
        let conn = migrated();
        let insert = "INSERT OR IGNORE INTO messages (provider_id, provider_type, date) VALUES (1, 'SMS', 0)";
        conn.execute(insert, []).unwrap();
        let changed = conn.execute(insert, []).unwrap();
        assert_eq!(changed, 0);
    }
}
