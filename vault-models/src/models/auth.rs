//! Local password record.
//!
//! Only the lowercase hex SHA-256 of the password is stored, in a table that
//! holds at most one row.

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use vault_core::error::{VaultError, VaultResult};

/// Lowercase hex SHA-256 of a password.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn stored_hash(conn: &Connection) -> VaultResult<Option<String>> {
    match conn.query_row("SELECT password FROM auth LIMIT 1", [], |row| {
        row.get::<_, Option<String>>(0)
    }) {
        Ok(hash) => Ok(hash),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(VaultError::Database(e.to_string())),
    }
}

/// Replace the stored password. Any previous record is removed first.
pub fn set_password(conn: &Connection, password: &str) -> VaultResult<()> {
    let hash = hash_password(password);
    conn.execute_batch("SAVEPOINT set_password")
        .map_err(|e| VaultError::Database(e.to_string()))?;

    let result = conn
        .execute("DELETE FROM auth", [])
        .and_then(|_| conn.execute("INSERT INTO auth (password) VALUES (?1)", [&hash]));

    match result {
        Ok(_) => {
            conn.execute_batch("RELEASE set_password")
                .map_err(|e| VaultError::Database(e.to_string()))?;
            info!("vault password updated");
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK TO set_password; RELEASE set_password");
            Err(VaultError::Database(e.to_string()))
        }
    }
}

/// True only when a password is set and `password` is exactly it.
pub fn verify_password(conn: &Connection, password: &str) -> VaultResult<bool> {
    Ok(match stored_hash(conn)? {
        Some(hash) => hash == hash_password(password),
        None => false,
    })
}

pub fn has_password(conn: &Connection) -> VaultResult<bool> {
    Ok(stored_hash(conn)?.is_some())
}

/// Replace the password after checking the current one.
pub fn change_password(conn: &Connection, current: &str, new: &str) -> VaultResult<()> {
    if !verify_password(conn, current)? {
        warn!("password change rejected: current password mismatch");
        return Err(VaultError::AuthFailed("current password does not match".into()));
    }
    set_password(conn, new)
}
