//! CLI command implementations.

pub mod password;
pub mod docs;
pub mod messages;
pub mod sync;
pub mod capture;
pub mod email;
pub mod db;

use std::sync::Arc;

use console::style;
use dialoguer::Password;

use vault_core::config::ConfigHandle;
use vault_core::error::{VaultError, VaultResult};
use vault_models::models::auth;
use vault_models::Database;
use vault_services::{EmailSender, EventBus, SmtpMailTransport};

/// Helper to initialize the database from config.
pub async fn init_database(config: &ConfigHandle) -> VaultResult<Database> {
    let config = config.read().await;
    let db_path = config.effective_db_path()?;
    Database::init(&db_path, &config.database)
}

/// Require the vault password when one is set.
pub fn unlock(db: &Database, password: Option<&str>) -> VaultResult<()> {
    let conn = db.conn()?;
    if !auth::has_password(&conn)? {
        return Ok(());
    }
    let entered = match password {
        Some(p) => p.to_string(),
        None => prompt_password("Vault password")?,
    };
    if auth::verify_password(&conn, &entered)? {
        Ok(())
    } else {
        println!("  {} Incorrect password.", style("DENIED").red().bold());
        Err(VaultError::AuthFailed("incorrect vault password".into()))
    }
}

pub fn prompt_password(prompt: &str) -> VaultResult<String> {
    Password::new()
        .with_prompt(format!("  {prompt}"))
        .interact()
        .map_err(|e| VaultError::Internal(format!("failed to read password: {e}")))
}

/// Start the email worker with the SMTP transport.
/// Callers must `shutdown().await` it so queued mail is delivered.
pub async fn start_email_sender(config: &ConfigHandle) -> EmailSender {
    let capacity = config.read().await.email_queue.capacity;
    EmailSender::spawn(Arc::new(SmtpMailTransport), capacity, EventBus::default())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Truncate a string to a maximum number of characters, appending an ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_len {
        s
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}
