//! Settings key-value store with typed accessors.
//!
//! Each setting is stored as a TEXT value; typed accessors handle parsing.
//! The SMTP configuration lives here under the `email.` prefix.

use rusqlite::{params, Connection};
use std::collections::HashMap;
use vault_core::config::EmailConfig;
use vault_core::constants::DEFAULT_SMTP_PORT;
use vault_core::error::{VaultError, VaultResult};

/// Settings key-value store backed by the `settings` table.
pub struct Settings;

impl Settings {
    /// Get a raw string value for a key.
    pub fn get(conn: &Connection, key: &str) -> VaultResult<Option<String>> {
        match conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VaultError::Database(e.to_string())),
        }
    }

    /// Set a raw string value for a key (upsert).
    pub fn set(conn: &Connection, key: &str, value: &str) -> VaultResult<()> {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a setting by key.
    pub fn delete(conn: &Connection, key: &str) -> VaultResult<bool> {
        let changed = conn
            .execute("DELETE FROM settings WHERE key = ?1", [key])
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Get every setting whose key starts with `prefix`.
    pub fn get_prefixed(conn: &Connection, prefix: &str) -> VaultResult<HashMap<String, String>> {
        let mut stmt = conn
            .prepare("SELECT key, value FROM settings WHERE substr(key, 1, length(?1)) = ?1")
            .map_err(|e| VaultError::Database(e.to_string()))?;

        let map = stmt
            .query_map([prefix], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| VaultError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(map)
    }

    /// Set multiple settings at once (batch upsert).
    pub fn set_many(conn: &Connection, entries: &[(&str, &str)]) -> VaultResult<()> {
        let mut stmt = conn
            .prepare(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .map_err(|e| VaultError::Database(e.to_string()))?;

        for (key, value) in entries {
            stmt.execute(params![key, value])
                .map_err(|e| VaultError::Database(e.to_string()))?;
        }
        Ok(())
    }

    // ─── Typed accessors ─────────────────────────────────────────────────

    /// Get a boolean setting (stored as "true"/"false" or "1"/"0").
    pub fn get_bool(conn: &Connection, key: &str) -> VaultResult<Option<bool>> {
        Ok(Self::get(conn, key)?.map(|v| v == "true" || v == "1"))
    }

    pub fn set_bool(conn: &Connection, key: &str, value: bool) -> VaultResult<()> {
        Self::set(conn, key, if value { "true" } else { "false" })
    }

    /// Get an integer setting. Unparsable values read as absent.
    pub fn get_i64(conn: &Connection, key: &str) -> VaultResult<Option<i64>> {
        Ok(Self::get(conn, key)?.and_then(|v| v.parse().ok()))
    }

    pub fn set_i64(conn: &Connection, key: &str, value: i64) -> VaultResult<()> {
        Self::set(conn, key, &value.to_string())
    }

    // ─── Email configuration ─────────────────────────────────────────────

    /// Load the SMTP configuration. Missing keys take their defaults.
    pub fn load_email_config(conn: &Connection) -> VaultResult<EmailConfig> {
        let text = |key: &str| -> VaultResult<String> {
            Ok(Self::get(conn, key)?.unwrap_or_default())
        };

        let port = Self::get_i64(conn, keys::EMAIL_PORT)?
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p > 0)
            .unwrap_or(DEFAULT_SMTP_PORT);

        Ok(EmailConfig {
            host: text(keys::EMAIL_HOST)?,
            port,
            username: text(keys::EMAIL_USERNAME)?,
            password: text(keys::EMAIL_PASSWORD)?,
            recipient: text(keys::EMAIL_RECIPIENT)?,
            use_tls: Self::get_bool(conn, keys::EMAIL_USE_TLS)?.unwrap_or(true),
        })
    }

    /// Persist the SMTP configuration. Text fields are stored trimmed,
    /// except the password which is stored as given.
    pub fn save_email_config(conn: &Connection, config: &EmailConfig) -> VaultResult<()> {
        let port = config.port.to_string();
        let use_tls = if config.use_tls { "true" } else { "false" };
        Self::set_many(
            conn,
            &[
                (keys::EMAIL_HOST, config.host.trim()),
                (keys::EMAIL_PORT, &port),
                (keys::EMAIL_USERNAME, config.username.trim()),
                (keys::EMAIL_PASSWORD, &config.password),
                (keys::EMAIL_RECIPIENT, config.recipient.trim()),
                (keys::EMAIL_USE_TLS, use_tls),
            ],
        )
    }

    /// Remove every stored email key.
    pub fn clear_email_config(conn: &Connection) -> VaultResult<()> {
        conn.execute(
            "DELETE FROM settings WHERE substr(key, 1, length(?1)) = ?1",
            [keys::EMAIL_PREFIX],
        )
        .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─── Setting key constants ───────────────────────────────────────────────────

pub mod keys {
    pub const EMAIL_PREFIX: &str = "email.";
    pub const EMAIL_HOST: &str = "email.host";
    pub const EMAIL_PORT: &str = "email.port";
    pub const EMAIL_USERNAME: &str = "email.username";
    pub const EMAIL_PASSWORD: &str = "email.password";
    pub const EMAIL_RECIPIENT: &str = "email.recipient";
    pub const EMAIL_USE_TLS: &str = "email.use_tls";

    /// Milliseconds timestamp of the last completed message sync.
    pub const LAST_SYNC_AT: &str = "sync.last_completed_at";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_conn;

    #[test]
    fn test_settings_crud() {
        let conn = test_conn();

        Settings::set(&conn, "testKey", "testValue").unwrap();
        assert_eq!(Settings::get(&conn, "testKey").unwrap(), Some("testValue".to_string()));

        Settings::set(&conn, "testKey", "updatedValue").unwrap();
        assert_eq!(Settings::get(&conn, "testKey").unwrap(), Some("updatedValue".to_string()));

        assert!(Settings::delete(&conn, "testKey").unwrap());
        assert_eq!(Settings::get(&conn, "testKey").unwrap(), None);
    }

    #[test]
    fn test_settings_typed() {
        let conn = test_conn();
        Settings::set_bool(&conn, "flag", true).unwrap();
        assert_eq!(Settings::get_bool(&conn, "flag").unwrap(), Some(true));
        Settings::set_i64(&conn, keys::LAST_SYNC_AT, 3000).unwrap();
        assert_eq!(Settings::get_i64(&conn, keys::LAST_SYNC_AT).unwrap(), Some(3000));
        assert_eq!(Settings::get_i64(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn test_email_config_defaults_when_empty() {
        let conn = test_conn();
        let cfg = Settings::load_email_config(&conn).unwrap();
        assert_eq!(cfg, EmailConfig::default());
        assert!(!cfg.is_configured());
    }

    #[test]
    fn test_email_config_roundtrip() {
        let conn = test_conn();
        let cfg = EmailConfig {
            host: " smtp.example.com ".into(),
            port: 2525,
            username: "me@example.com".into(),
            password: " pw ".into(),
            recipient: "vault@example.com".into(),
            use_tls: false,
        };
        Settings::save_email_config(&conn, &cfg).unwrap();

        let loaded = Settings::load_email_config(&conn).unwrap();
        assert_eq!(loaded.host, "smtp.example.com");
        assert_eq!(loaded.port, 2525);
        assert_eq!(loaded.password, " pw ");
        assert!(!loaded.use_tls);
        assert!(loaded.is_configured());
        assert_eq!(Settings::get_prefixed(&conn, keys::EMAIL_PREFIX).unwrap().len(), 6);
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let conn = test_conn();
        Settings::set(&conn, keys::EMAIL_PORT, "not-a-port").unwrap();
        assert_eq!(Settings::load_email_config(&conn).unwrap().port, DEFAULT_SMTP_PORT);
        Settings::set(&conn, keys::EMAIL_PORT, "70000").unwrap();
        assert_eq!(Settings::load_email_config(&conn).unwrap().port, DEFAULT_SMTP_PORT);
    }

    #[test]
    fn test_clear_email_config() {
        let conn = test_conn();
        Settings::save_email_config(&conn, &EmailConfig::default()).unwrap();
        Settings::set(&conn, "other", "kept").unwrap();
        Settings::clear_email_config(&conn).unwrap();
        assert!(Settings::get_prefixed(&conn, keys::EMAIL_PREFIX).unwrap().is_empty());
        assert_eq!(Settings::get(&conn, "other").unwrap().as_deref(), Some("kept"));
    }
}
