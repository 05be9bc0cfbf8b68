//! Vault Services - Business logic and service layer.
//!
//! This crate provides:
//! - The message ingester (SMS/MMS provider to local store)
//! - Message source and attachment sink abstractions
//! - Capture handlers for arriving SMS and MMS
//! - Document management
//! - Notification dispatch and the single-worker email sender
//! - Settings persistence
//! - Event bus (typed intra-service communication)

pub mod event_bus;
pub mod source;
pub mod sync;
pub mod formatter;
pub mod email;
pub mod dispatch;
pub mod capture;
pub mod documents;
pub mod settings;

// Re-export key types
pub use event_bus::{AppEvent, EventBus};
pub use source::{
    AttachmentSink, DirectoryAttachmentSink, JsonExportSource, MessageSource, MmsPart, ProviderMms,
    ProviderSms,
};
pub use sync::{MessageSyncService, SyncReport};
pub use email::{EmailAttachment, EmailSender, MailTransport, OutgoingEmail, SmtpMailTransport};
pub use dispatch::{MessageKind, NotificationDispatcher};
pub use capture::{CaptureService, IncomingSms};
pub use documents::{DocumentService, NewDocument};
pub use settings::SettingsService;
