//! Global error types for the Vault application.
//!
//! All error categories across the application are unified into a single
//! `VaultError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using VaultError.
pub type VaultResult<T> = Result<T, VaultError>;

/// Unified error type covering all error categories in Vault.
#[derive(Error, Debug)]
pub enum VaultError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Database errors --
    /// SQLite database error.
    #[error("database error: {0}")]
    Database(String),

    /// Database migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database connection pool error.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// Database integrity check failed.
    #[error("database integrity check failed: {0}")]
    IntegrityCheck(String),

    // -- Access errors --
    /// The vault password did not match.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    // -- Message provider errors --
    /// Reading from the message provider failed.
    #[error("message provider error: {0}")]
    Provider(String),

    // -- Email errors --
    /// Building or delivering an email failed.
    #[error("email error: {0}")]
    Email(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Input errors --
    /// A value supplied by the user was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for VaultError {
    fn from(e: toml::de::Error) -> Self {
        VaultError::Config(e.to_string())
    }
}

impl VaultError {
    /// Whether this error is transient and the affected record can simply be skipped.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            VaultError::Io(_) | VaultError::Provider(_) | VaultError::Email(_)
        )
    }
}
