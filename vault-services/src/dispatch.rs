//! Notification dispatcher.
//!
//! Turns a captured document into an email and hands it to the email
//! worker, but only when SMTP settings are complete. With no usable
//! configuration every call is a quiet no-op.

use chrono::{DateTime, Local, TimeZone};
use tracing::debug;

use vault_core::config::EmailConfig;
use vault_core::constants::placeholders;
use vault_core::error::VaultResult;
use vault_models::{Database, Document, Settings};

use crate::email::{EmailAttachment, EmailSender, OutgoingEmail};
use crate::formatter;

/// What kind of message produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Sms,
    Mms,
    /// A message-category document entered by hand.
    Chat,
}

impl MessageKind {
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::Sms => "SMS",
            MessageKind::Mms => "MMS",
            MessageKind::Chat => "Chat",
        }
    }
}

/// `{label} - {ddMMyy}{ss}` where `ss` is epoch seconds modulo 100.
pub fn build_subject<Tz: TimeZone>(kind: MessageKind, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} - {}{:02}",
        kind.label(),
        now.format("%d%m%y"),
        now.timestamp().rem_euclid(100)
    )
}

/// Email body for a captured document.
pub fn build_body(document: &Document, sender: &str) -> String {
    formatter::format_message(
        sender,
        document.timestamp,
        document.content.as_deref().unwrap_or_default(),
    )
}

/// Email body for a manually forwarded document.
pub fn build_forward_body(document: &Document) -> String {
    let content = document
        .content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(placeholders::EMPTY_BODY);
    format!(
        "Title: {}\nCategory: {}\nDate: {}\n\n{content}",
        document.title,
        document.category,
        formatter::format_timestamp(document.timestamp)
    )
}

fn attachment_of(document: &Document) -> Option<EmailAttachment> {
    document.attachment.as_ref().map(|a| EmailAttachment {
        uri: a.uri.clone(),
        mime_type: a.mime_type.clone(),
        file_name: a.display_name.clone(),
    })
}

/// Sends captured content to the configured mailbox.
#[derive(Clone)]
pub struct NotificationDispatcher {
    database: Database,
    email: EmailSender,
}

impl NotificationDispatcher {
    pub fn new(database: Database, email: EmailSender) -> Self {
        Self { database, email }
    }

    /// Current SMTP settings, if they are complete.
    fn configured(&self) -> VaultResult<Option<EmailConfig>> {
        let conn = self.database.conn()?;
        let config = Settings::load_email_config(&conn)?;
        Ok(config.is_configured().then_some(config))
    }

    /// Queue an email for a captured document. Returns whether one was queued.
    pub fn dispatch(&self, document: &Document, sender: &str, kind: MessageKind) -> VaultResult<bool> {
        let Some(config) = self.configured()? else {
            debug!("email not configured, skipping {} dispatch", kind.label());
            return Ok(false);
        };

        let mut email = OutgoingEmail::new(
            build_subject(kind, &Local::now()),
            build_body(document, sender),
        );
        email.attachments.extend(attachment_of(document));
        Ok(self.email.send(config, email))
    }

    /// Queue a document as-is, subject `Vault document: {title}`.
    pub fn forward_document(&self, document: &Document) -> VaultResult<bool> {
        let Some(config) = self.configured()? else {
            debug!("email not configured, cannot forward document");
            return Ok(false);
        };

        let mut email = OutgoingEmail::new(
            format!("Vault document: {}", document.title),
            build_forward_body(document),
        );
        email.attachments.extend(attachment_of(document));
        Ok(self.email.send(config, email))
    }
}
