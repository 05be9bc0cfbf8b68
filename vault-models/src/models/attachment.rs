//! Attachment copied out of an MMS part.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use vault_core::error::{VaultError, VaultResult};

/// A file copied from a provider MMS part. `(message_id, provider_part_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAttachment {
    pub id: Option<i64>,
    pub message_id: i64,
    pub provider_part_id: i64,
    pub file_path: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}

impl MessageAttachment {
    /// Construct a MessageAttachment from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            message_id: row.get(1)?,
            provider_part_id: row.get(2)?,
            file_path: row.get(3)?,
            content_type: row.get(4)?,
            size_bytes: row.get(5)?,
        })
    }

    pub(crate) const SELECT: &'static str =
        "SELECT id, message_id, provider_part_id, file_path, content_type, size_bytes FROM message_attachments";

    /// Whether the part has already been recorded for this message.
    pub fn exists(conn: &Connection, message_id: i64, provider_part_id: i64) -> VaultResult<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM message_attachments WHERE message_id = ?1 AND provider_part_id = ?2",
                params![message_id, provider_part_id],
                |row| row.get(0),
            )
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Insert, ignoring a duplicate key. Returns whether a row was written.
    pub fn insert(&mut self, conn: &Connection) -> VaultResult<bool> {
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO message_attachments (
                    message_id, provider_part_id, file_path, content_type, size_bytes
                ) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    self.message_id,
                    self.provider_part_id,
                    self.file_path,
                    self.content_type,
                    self.size_bytes,
                ],
            )
            .map_err(|e| VaultError::Database(e.to_string()))?;

        if changed > 0 {
            self.id = Some(conn.last_insert_rowid());
        }
        Ok(changed > 0)
    }

    /// Human-readable size string.
    pub fn human_size(&self) -> String {
        let bytes = self.size_bytes as f64;
        if bytes < 1024.0 {
            format!("{} B", self.size_bytes)
        } else if bytes < 1024.0 * 1024.0 {
            format!("{:.1} KB", bytes / 1024.0)
        } else {
            format!("{:.1} MB", bytes / (1024.0 * 1024.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_conn;

    fn seed_message(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO messages (provider_id, provider_type, date) VALUES (1, 'MMS', 0)",
            [],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn part(message_id: i64, part_id: i64) -> MessageAttachment {
        MessageAttachment {
            id: None,
            message_id,
            provider_part_id: part_id,
            file_path: format!("/vault/1_{part_id}.jpeg"),
            content_type: Some("image/jpeg".into()),
            size_bytes: 2048,
        }
    }

    #[test]
    fn test_insert_twice_keeps_one_row() {
        let conn = test_conn();
        let msg = seed_message(&conn);

        assert!(part(msg, 11).insert(&conn).unwrap());
        assert!(!part(msg, 11).insert(&conn).unwrap());
        assert!(MessageAttachment::exists(&conn, msg, 11).unwrap());
        assert!(!MessageAttachment::exists(&conn, msg, 12).unwrap());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM message_attachments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_human_size() {
        let mut att = part(1, 1);
        assert_eq!(att.human_size(), "2.0 KB");
        att.size_bytes = 512;
        assert_eq!(att.human_size(), "512 B");
    }
}
