//! Capture handlers for newly arrived messages.
//!
//! Each handler turns one arrived message into a vault document in the
//! messages category, saves it, and passes it to the notification
//! dispatcher. A dispatch failure never undoes the saved document.

use std::sync::Arc;

use tracing::{info, warn};

use vault_core::constants::placeholders;
use vault_core::error::VaultResult;
use vault_models::{Category, Database, Document, DocumentAttachment};

use crate::dispatch::{MessageKind, NotificationDispatcher};
use crate::event_bus::{AppEvent, EventBus};
use crate::formatter;
use crate::source::{self, AttachmentSink, MessageSource, MmsPart};

/// An SMS as delivered by the platform: one or more PDU segments.
#[derive(Debug, Clone, Default)]
pub struct IncomingSms {
    pub segments: Vec<String>,
    pub sender: Option<String>,
    /// Milliseconds since the Unix epoch; zero when the platform gave none.
    pub timestamp: i64,
}

impl IncomingSms {
    pub fn body(&self) -> String {
        self.segments.concat()
    }

    pub fn sender(&self) -> &str {
        self.sender
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(placeholders::UNKNOWN_SENDER)
    }

    pub fn effective_timestamp(&self) -> i64 {
        if self.timestamp > 0 {
            self.timestamp
        } else {
            chrono::Utc::now().timestamp_millis()
        }
    }
}

/// Creates vault documents from arriving SMS and MMS.
pub struct CaptureService {
    database: Database,
    dispatcher: NotificationDispatcher,
    event_bus: EventBus,
    sink: Arc<dyn AttachmentSink>,
}

impl CaptureService {
    pub fn new(
        database: Database,
        dispatcher: NotificationDispatcher,
        event_bus: EventBus,
        sink: Arc<dyn AttachmentSink>,
    ) -> Self {
        Self {
            database,
            dispatcher,
            event_bus,
            sink,
        }
    }

    /// Save an arrived SMS as a document titled `SMS from {sender}`.
    pub fn capture_sms(&self, sms: &IncomingSms) -> VaultResult<Document> {
        let sender = sms.sender();
        let timestamp = sms.effective_timestamp();

        let mut document = Document::new(
            format!("SMS from {sender}"),
            Some(formatter::format_message(sender, timestamp, &sms.body())),
            Category::Messages,
        );
        document.timestamp = timestamp;

        self.save_and_dispatch(&mut document, sender, MessageKind::Sms)?;
        Ok(document)
    }

    /// Save the newest MMS in `source` as a document titled
    /// `Message from {sender}`. The first non-text part that carries data
    /// is copied through the sink and attached. Returns `None` when the
    /// inbox is empty.
    pub fn capture_latest_mms(&self, source: &dyn MessageSource) -> VaultResult<Option<Document>> {
        let Some(mms) = source.latest_mms()? else {
            info!("no mms in inbox, nothing to capture");
            return Ok(None);
        };

        let timestamp = mms.timestamp_ms();
        let sender = source::mms_sender(source, mms.id);
        let parts = source.mms_parts(mms.id)?;
        let body = source::mms_body(source, mms.subject.as_deref(), &parts);

        let mut document = Document::new(
            format!("Message from {sender}"),
            Some(formatter::format_message(&sender, timestamp, &body)),
            Category::Messages,
        );
        document.timestamp = timestamp;

        if let Some(part) = parts.iter().find(|p| p.is_attachment() && p.has_data()) {
            match self.copy_first_attachment(source, mms.id, part) {
                Ok(Some(attachment)) => document.attachment = Some(attachment),
                Ok(None) => warn!("mms {}: attachment part {} was empty", mms.id, part.id),
                Err(e) => warn!("mms {}: could not copy attachment part {}: {e}", mms.id, part.id),
            }
        }

        self.save_and_dispatch(&mut document, &sender, MessageKind::Mms)?;
        Ok(Some(document))
    }

    fn copy_first_attachment(
        &self,
        source: &dyn MessageSource,
        mms_id: i64,
        part: &MmsPart,
    ) -> VaultResult<Option<DocumentAttachment>> {
        let content_type = part.content_type.clone().unwrap_or_default();
        let file_name = source::build_attachment_name(
            mms_id,
            part.id,
            &content_type,
            part.content_location.as_deref(),
        );
        let mut reader = source.open_part(part.id)?;
        let (path, size) = self.sink.store(&file_name, &mut reader)?;
        if size == 0 {
            return Ok(None);
        }
        Ok(Some(DocumentAttachment {
            uri: path.to_string_lossy().into_owned(),
            mime_type: Some(content_type),
            display_name: Some(part.display_name()),
        }))
    }

    fn save_and_dispatch(
        &self,
        document: &mut Document,
        sender: &str,
        kind: MessageKind,
    ) -> VaultResult<()> {
        let id = {
            let conn = self.database.conn()?;
            document.save(&conn)?
        };
        info!("captured {} as document {id}", kind.label());

        self.event_bus.emit(AppEvent::DocumentSaved {
            document_id: id,
            category: document.category.to_string(),
        });

        if let Err(e) = self.dispatcher.dispatch(document, sender, kind) {
            warn!("document {id}: email dispatch failed: {e}");
        }
        Ok(())
    }
}
