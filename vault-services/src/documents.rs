//! Document management: create, browse, recategorize, delete, forward.

use tracing::{info, warn};

use vault_core::error::{VaultError, VaultResult};
use vault_models::{queries, Category, Database, Document, DocumentAttachment};

use crate::dispatch::{MessageKind, NotificationDispatcher};
use crate::event_bus::{AppEvent, EventBus};

/// Fields for a document entered by the user.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub content: Option<String>,
    pub category: Category,
    pub attachment: Option<DocumentAttachment>,
}

/// Service wrapping document persistence with validation and notifications.
pub struct DocumentService {
    database: Database,
    event_bus: EventBus,
    dispatcher: Option<NotificationDispatcher>,
}

impl DocumentService {
    pub fn new(database: Database, event_bus: EventBus) -> Self {
        Self {
            database,
            event_bus,
            dispatcher: None,
        }
    }

    /// Enable email dispatch for message documents and manual forwarding.
    pub fn with_dispatcher(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Validate and save a user-created document.
    ///
    /// Text and message documents need content; image, media and other
    /// documents need a file. A message document is also emailed, with the
    /// title standing in for the sender.
    pub fn add_document(&self, new: NewDocument) -> VaultResult<Document> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(VaultError::InvalidInput("title is required".into()));
        }
        let content = new.content.filter(|c| !c.trim().is_empty());
        if new.category.requires_text() && content.is_none() {
            return Err(VaultError::InvalidInput(format!(
                "{} documents need content",
                new.category
            )));
        }
        if new.category.requires_attachment() && new.attachment.is_none() {
            return Err(VaultError::InvalidInput(format!(
                "{} documents need an attachment",
                new.category
            )));
        }

        let mut document = Document::new(title, content, new.category);
        document.attachment = new.attachment;
        let id = {
            let conn = self.database.conn()?;
            document.save(&conn)?
        };
        info!("saved document {id} ({})", document.category);
        self.event_bus.emit(AppEvent::DocumentSaved {
            document_id: id,
            category: document.category.to_string(),
        });

        if document.category == Category::Messages {
            if let Some(dispatcher) = &self.dispatcher {
                if let Err(e) = dispatcher.dispatch(&document, &document.title, MessageKind::Chat) {
                    warn!("document {id}: email dispatch failed: {e}");
                }
            }
        }
        Ok(document)
    }

    /// Documents newest first, optionally limited to one category.
    pub fn list(&self, category: Option<Category>) -> VaultResult<Vec<Document>> {
        let conn = self.database.conn()?;
        match category {
            Some(c) => queries::list_documents_by_category(&conn, c),
            None => queries::list_documents(&conn),
        }
    }

    pub fn search(&self, term: &str) -> VaultResult<Vec<Document>> {
        let conn = self.database.conn()?;
        queries::search_documents(&conn, term)
    }

    pub fn get(&self, id: i64) -> VaultResult<Option<Document>> {
        let conn = self.database.conn()?;
        Document::find_by_id(&conn, id)
    }

    pub fn update_category(&self, id: i64, category: Category) -> VaultResult<bool> {
        let conn = self.database.conn()?;
        Document::update_category(&conn, id, category)
    }

    pub fn delete(&self, id: i64) -> VaultResult<bool> {
        let conn = self.database.conn()?;
        let removed = Document::delete(&conn, id)?;
        if removed {
            self.event_bus.emit(AppEvent::DocumentsDeleted { count: 1 });
        }
        Ok(removed)
    }

    /// Remove every document. Returns how many were removed.
    pub fn delete_all(&self) -> VaultResult<usize> {
        let conn = self.database.conn()?;
        let count = queries::delete_all_documents(&conn)?;
        warn!("deleted all {count} document(s)");
        self.event_bus.emit(AppEvent::DocumentsDeleted { count });
        Ok(count)
    }

    pub fn count(&self) -> VaultResult<i64> {
        let conn = self.database.conn()?;
        queries::count_documents(&conn)
    }

    /// Email one document. Returns false when email is not configured.
    pub fn forward(&self, id: i64) -> VaultResult<bool> {
        let document = self
            .get(id)?
            .ok_or_else(|| VaultError::InvalidInput(format!("no document with id {id}")))?;
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.forward_document(&document),
            None => Ok(false),
        }
    }
}
