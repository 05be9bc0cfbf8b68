//! Application configuration management.
//!
//! The application configuration (database, logging, storage locations and
//! email queue sizing) is persisted as TOML on disk. Email credentials are
//! not part of the TOML file: they live in the vault database's key-value
//! settings table and are represented here by [`EmailConfig`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::{self, DEFAULT_SMTP_PORT};
use crate::error::{VaultError, VaultResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// File storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Outgoing email queue settings.
    #[serde(default)]
    pub email_queue: EmailQueueConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. If empty, uses default location.
    #[serde(default)]
    pub path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Run integrity check on startup.
    #[serde(default = "default_true")]
    pub integrity_check_on_startup: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output in the log file.
    #[serde(default)]
    pub json_output: bool,
}

/// File storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving copied message attachments. If empty, uses
    /// `<data dir>/attachments`.
    #[serde(default)]
    pub attachments_dir: String,
}

/// Outgoing email queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailQueueConfig {
    /// Maximum number of emails waiting for the worker.
    #[serde(default = "default_email_queue_capacity")]
    pub capacity: usize,
}

/// SMTP settings used to forward captured content.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// One address, or several separated by commas.
    pub recipient: String,
    #[serde(default = "default_true")]
    pub use_tls: bool,
}

// Default value functions for serde

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_email_queue_capacity() -> usize {
    constants::DEFAULT_EMAIL_QUEUE_CAPACITY
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            wal_mode: true,
            pool_size: default_pool_size(),
            integrity_check_on_startup: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl Default for EmailQueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_email_queue_capacity(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SMTP_PORT,
            username: String::new(),
            password: String::new(),
            recipient: String::new(),
            use_tls: true,
        }
    }
}

impl EmailConfig {
    /// Email forwarding is enabled only when host, username, password and
    /// recipient are all present.
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.password.is_empty()
            && !self.recipient.trim().is_empty()
    }

    /// Individual recipient addresses, trimmed, empty entries dropped.
    pub fn recipients(&self) -> Vec<&str> {
        self.recipient
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .collect()
    }
}

// Keep the SMTP password out of logs and debug output.
impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("recipient", &self.recipient)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> VaultResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> VaultResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> VaultResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| VaultError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> VaultResult<PathBuf> {
        Ok(Platform::config_dir()?.join("config.toml"))
    }

    /// Get the effective database path, using the configured path or the default.
    pub fn effective_db_path(&self) -> VaultResult<PathBuf> {
        if self.database.path.is_empty() {
            Ok(Platform::data_dir()?.join(constants::DB_FILE_NAME))
        } else {
            Ok(PathBuf::from(&self.database.path))
        }
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> VaultResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Platform::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Get the effective attachments directory.
    pub fn effective_attachments_dir(&self) -> VaultResult<PathBuf> {
        if self.storage.attachments_dir.is_empty() {
            Ok(Platform::data_dir()?.join(constants::ATTACHMENTS_DIR_NAME))
        } else {
            Ok(PathBuf::from(&self.storage.attachments_dir))
        }
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }
}
