//! Settings service.
//!
//! Email settings are stored in the vault database; everything else comes
//! from the TOML application config behind the shared [`ConfigHandle`].

use std::path::PathBuf;

use tracing::info;
use vault_core::config::{ConfigHandle, EmailConfig};
use vault_core::error::{VaultError, VaultResult};
use vault_models::{Database, Settings};

pub struct SettingsService {
    config: ConfigHandle,
    database: Database,
}

impl SettingsService {
    pub fn new(config: ConfigHandle, database: Database) -> Self {
        Self { config, database }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    // ─── Email settings ──────────────────────────────────────────────────

    pub fn email_config(&self) -> VaultResult<EmailConfig> {
        let conn = self.database.conn()?;
        Settings::load_email_config(&conn)
    }

    /// Store SMTP settings. A zero port, a host with inner spaces and a
    /// recipient that is not an email address are rejected.
    pub fn save_email_config(&self, config: &EmailConfig) -> VaultResult<()> {
        if config.port == 0 {
            return Err(VaultError::InvalidInput("smtp port must be non-zero".into()));
        }
        if config.host.trim().contains(char::is_whitespace) {
            return Err(VaultError::InvalidInput("smtp host must not contain spaces".into()));
        }
        if config.recipients().iter().any(|r| !r.contains('@')) {
            return Err(VaultError::InvalidInput("recipient must be an email address".into()));
        }
        let conn = self.database.conn()?;
        Settings::save_email_config(&conn, config)?;
        info!("email settings saved (configured: {})", config.is_configured());
        Ok(())
    }

    pub fn clear_email_config(&self) -> VaultResult<()> {
        let conn = self.database.conn()?;
        Settings::clear_email_config(&conn)?;
        info!("email settings cleared");
        Ok(())
    }

    // ─── Application config ──────────────────────────────────────────────

    pub async fn attachments_dir(&self) -> VaultResult<PathBuf> {
        self.config.read().await.effective_attachments_dir()
    }

    pub async fn email_queue_capacity(&self) -> usize {
        self.config.read().await.email_queue.capacity
    }
}
