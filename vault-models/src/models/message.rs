//! Synchronized provider message model.

use std::fmt;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use vault_core::constants::provider;
use vault_core::error::{VaultError, VaultResult};

/// Which telephony provider table a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "SMS")]
    Sms,
    #[serde(rename = "MMS")]
    Mms,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Sms => provider::SMS,
            ProviderType::Mms => provider::MMS,
        }
    }

    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            provider::SMS => Some(ProviderType::Sms),
            provider::MMS => Some(ProviderType::Mms),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message copied out of the telephony provider.
///
/// `(provider_id, provider_type)` identifies the provider record; saving the
/// same key twice leaves the first row untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Option<i64>,
    pub provider_id: i64,
    pub provider_type: ProviderType,
    pub address: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    pub body: Option<String>,
    pub box_type: i32,
    pub has_attachments: bool,
}

impl StoredMessage {
    /// Construct a StoredMessage from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let provider_type: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            provider_id: row.get(1)?,
            provider_type: ProviderType::from_stored(&provider_type).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("unknown provider type {provider_type}").into(),
                )
            })?,
            address: row.get(3)?,
            date: row.get(4)?,
            body: row.get(5)?,
            box_type: row.get(6)?,
            has_attachments: row.get::<_, i32>(7)? != 0,
        })
    }

    pub(crate) const SELECT: &'static str =
        "SELECT id, provider_id, provider_type, address, date, body, box_type, has_attachments FROM messages";

    // ─── Static finders ──────────────────────────────────────────────────

    /// Find a message by local ID.
    pub fn find_by_id(conn: &Connection, id: i64) -> VaultResult<Option<Self>> {
        let sql = format!("{} WHERE id = ?1", Self::SELECT);
        match conn.query_row(&sql, [id], Self::from_row) {
            Ok(msg) => Ok(Some(msg)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VaultError::Database(e.to_string())),
        }
    }

    /// Find a message by its provider identity.
    pub fn find_by_provider_key(
        conn: &Connection,
        provider_id: i64,
        provider_type: ProviderType,
    ) -> VaultResult<Option<Self>> {
        let sql = format!("{} WHERE provider_id = ?1 AND provider_type = ?2", Self::SELECT);
        match conn.query_row(&sql, params![provider_id, provider_type.as_str()], Self::from_row) {
            Ok(msg) => Ok(Some(msg)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VaultError::Database(e.to_string())),
        }
    }

    /// Flag a message as carrying attachments. The flag is never cleared.
    pub fn mark_has_attachments(conn: &Connection, id: i64) -> VaultResult<()> {
        conn.execute("UPDATE messages SET has_attachments = 1 WHERE id = ?1", [id])
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Insert unless the provider key is already stored, then return the
    /// local ID of whichever row holds the key.
    pub fn save(&mut self, conn: &Connection) -> VaultResult<i64> {
        conn.execute(
            "INSERT INTO messages (
                provider_id, provider_type, address, date, body, box_type, has_attachments
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(provider_id, provider_type) DO NOTHING",
            params![
                self.provider_id,
                self.provider_type.as_str(),
                self.address,
                self.date,
                self.body,
                self.box_type,
                self.has_attachments as i32,
            ],
        )
        .map_err(|e| VaultError::Database(e.to_string()))?;

        // last_insert_rowid() is stale when the insert was ignored
        let real_id: i64 = conn
            .query_row(
                "SELECT id FROM messages WHERE provider_id = ?1 AND provider_type = ?2",
                params![self.provider_id, self.provider_type.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| VaultError::Database(e.to_string()))?;
        self.id = Some(real_id);
        Ok(real_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_conn;

    fn sms(provider_id: i64, body: &str) -> StoredMessage {
        StoredMessage {
            id: None,
            provider_id,
            provider_type: ProviderType::Sms,
            address: Some("+15550001".into()),
            date: 1_700_000_000_000,
            body: Some(body.into()),
            box_type: 1,
            has_attachments: false,
        }
    }

    #[test]
    fn test_save_twice_keeps_one_row() {
        let conn = test_conn();
        let first = sms(7, "first").save(&conn).unwrap();
        let second = sms(7, "changed").save(&conn).unwrap();
        assert_eq!(first, second);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let stored = StoredMessage::find_by_id(&conn, first).unwrap().unwrap();
        assert_eq!(stored.body.as_deref(), Some("first"));
    }

    #[test]
    fn test_same_id_different_type_is_distinct() {
        let conn = test_conn();
        let a = sms(3, "sms").save(&conn).unwrap();
        let mut mms = sms(3, "mms");
        mms.provider_type = ProviderType::Mms;
        let b = mms.save(&conn).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_attachment_flag_survives_resave() {
        let conn = test_conn();
        let id = sms(9, "x").save(&conn).unwrap();
        StoredMessage::mark_has_attachments(&conn, id).unwrap();
        sms(9, "x").save(&conn).unwrap();

        let stored = StoredMessage::find_by_provider_key(&conn, 9, ProviderType::Sms)
            .unwrap()
            .unwrap();
        assert!(stored.has_attachments);
    }

    #[test]
    fn test_find_missing() {
        let conn = test_conn();
        assert!(StoredMessage::find_by_id(&conn, 1).unwrap().is_none());
        assert!(StoredMessage::find_by_provider_key(&conn, 1, ProviderType::Mms)
            .unwrap()
            .is_none());
    }
}
