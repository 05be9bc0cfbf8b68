//! Database schema definitions.
//!
//! The vault schema is built up by the versioned migrations in
//! [`crate::migrations`]; this module owns the SQL for each version plus the
//! bookkeeping table that records which version has been applied.

use rusqlite::Connection;
use tracing::info;
use vault_core::error::{VaultError, VaultResult};

/// Create the schema version table if it does not exist.
pub fn create_tables(conn: &Connection) -> VaultResult<()> {
    conn.execute_batch(VERSION_TABLE_SQL)
        .map_err(|e| VaultError::Database(format!("failed to create schema: {e}")))?;
    info!("database schema verified");
    Ok(())
}

/// Drop all tables (used for database reset).
pub fn drop_tables(conn: &Connection) -> VaultResult<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS message_attachments;
         DROP TABLE IF EXISTS messages;
         DROP TABLE IF EXISTS documents;
         DROP TABLE IF EXISTS auth;
         DROP TABLE IF EXISTS settings;
         DROP TABLE IF EXISTS schema_version;",
    )
    .map_err(|e| VaultError::Database(format!("failed to drop tables: {e}")))?;
    Ok(())
}

const VERSION_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

/// v1: documents and the password table. Destructive: earlier layouts are discarded.
pub(crate) const V1_SQL: &str = r#"
DROP TABLE IF EXISTS documents;
DROP TABLE IF EXISTS auth;

CREATE TABLE documents (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT,
    content     TEXT,
    category    TEXT,
    timestamp   INTEGER
);

CREATE TABLE auth (
    password    TEXT
);
"#;

/// v2: optional file attachment on a document.
pub(crate) const V2_SQL: &str = r#"
ALTER TABLE documents ADD COLUMN attachment_uri TEXT;
ALTER TABLE documents ADD COLUMN attachment_mime_type TEXT;
ALTER TABLE documents ADD COLUMN attachment_name TEXT;
"#;

/// v3: messages synchronized from the telephony provider.
pub(crate) const V3_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    provider_id         INTEGER NOT NULL,
    provider_type       TEXT NOT NULL,
    address             TEXT,
    date                INTEGER NOT NULL,
    body                TEXT,
    box_type            INTEGER NOT NULL DEFAULT 0,
    has_attachments     INTEGER NOT NULL DEFAULT 0,
    UNIQUE(provider_id, provider_type)
);

CREATE TABLE IF NOT EXISTS message_attachments (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id          INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    provider_part_id    INTEGER NOT NULL,
    file_path           TEXT NOT NULL,
    content_type        TEXT,
    size_bytes          INTEGER NOT NULL DEFAULT 0,
    UNIQUE(message_id, provider_part_id)
);
"#;

/// v4: key-value settings and secondary indexes.
pub(crate) const V4_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key     TEXT PRIMARY KEY NOT NULL,
    value   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_category_timestamp ON documents(category, timestamp);
CREATE INDEX IF NOT EXISTS idx_documents_timestamp ON documents(timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_date ON messages(date);
CREATE INDEX IF NOT EXISTS idx_message_attachments_message ON message_attachments(message_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, table: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        assert!(table_exists(&conn, "schema_version"));
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_version_scripts_build_full_schema() {
        let conn = Connection::open_in_memory().unwrap();
        for sql in [V1_SQL, V2_SQL, V3_SQL, V4_SQL] {
            conn.execute_batch(sql).unwrap();
        }
        for table in ["documents", "auth", "messages", "message_attachments", "settings"] {
            assert!(table_exists(&conn, table), "table {table} should exist");
        }
    }

    #[test]
    fn test_drop_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute_batch(V1_SQL).unwrap();
        drop_tables(&conn).unwrap();
        assert!(!table_exists(&conn, "documents"));
        assert!(!table_exists(&conn, "schema_version"));
    }
}
