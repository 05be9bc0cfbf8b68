//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Vault";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "vault.db";

/// Database schema version.
pub const DB_SCHEMA_VERSION: i32 = 4;

/// Directory (under the data directory) holding copied message attachments.
pub const ATTACHMENTS_DIR_NAME: &str = "attachments";

/// Default SMTP submission port.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP connect and read timeout in seconds.
pub const SMTP_TIMEOUT_SECS: u64 = 10;

/// Default capacity of the outgoing email queue.
pub const DEFAULT_EMAIL_QUEUE_CAPACITY: usize = 32;

/// Address role of the sender in the MMS address table (PDU `FROM`).
pub const MMS_ADDRESS_TYPE_FROM: i32 = 137;

/// Extension used when a part's content type maps to nothing better.
pub const FALLBACK_ATTACHMENT_EXTENSION: &str = "bin";

/// Display placeholders shared by capture, dispatch and email.
pub mod placeholders {
    /// Sender shown when the provider has no address.
    pub const UNKNOWN_SENDER: &str = "Unknown";
    /// Body used when a message carries no text.
    pub const EMPTY_BODY: &str = "(Empty message)";
    /// Subject used when an email has none.
    pub const EMPTY_SUBJECT: &str = "(No subject)";
    /// File name used for an email attachment with no display name.
    pub const ATTACHMENT_NAME: &str = "attachment";
    /// Display name for an MMS part with neither name nor location.
    pub const MMS_ATTACHMENT_NAME: &str = "mms_attachment";
}

/// Provider type labels stored in the `messages.provider_type` column.
pub mod provider {
    pub const SMS: &str = "SMS";
    pub const MMS: &str = "MMS";
}

/// Default MIME type for attachments of unknown type.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_labels() {
        assert_eq!(provider::SMS, "SMS");
        assert_eq!(provider::MMS, "MMS");
    }

    #[test]
    fn test_schema_version_positive() {
        assert!(DB_SCHEMA_VERSION >= 1);
    }
}
