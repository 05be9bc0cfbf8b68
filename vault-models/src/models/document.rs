//! Vault document entity model.

use std::fmt;
use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use vault_core::error::{VaultError, VaultResult};

/// Document category. Every document belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Text,
    Images,
    Media,
    Messages,
    Other,
}

/// Value written by older releases for captured SMS.
pub const LEGACY_SMS_CATEGORY: &str = "sms";

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Text,
        Category::Images,
        Category::Media,
        Category::Messages,
        Category::Other,
    ];

    /// Canonical stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Text => "text",
            Category::Images => "images",
            Category::Media => "media",
            Category::Messages => "messages",
            Category::Other => "other",
        }
    }

    /// Every stored value that maps to this category.
    pub fn stored_values(&self) -> &'static [&'static str] {
        match self {
            Category::Messages => &["messages", LEGACY_SMS_CATEGORY],
            Category::Text => &["text"],
            Category::Images => &["images"],
            Category::Media => &["media"],
            Category::Other => &["other"],
        }
    }

    /// Read a stored value, folding the legacy `sms` value into messages.
    /// Unrecognized values fall back to [`Category::Other`].
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or(Category::Other)
    }

    /// Whether new documents in this category must carry text content.
    pub fn requires_text(&self) -> bool {
        matches!(self, Category::Text | Category::Messages)
    }

    /// Whether new documents in this category must carry a file.
    pub fn requires_attachment(&self) -> bool {
        matches!(self, Category::Images | Category::Media | Category::Other)
    }
}

impl FromStr for Category {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Category::Text),
            "images" => Ok(Category::Images),
            "media" => Ok(Category::Media),
            "messages" | LEGACY_SMS_CATEGORY => Ok(Category::Messages),
            "other" => Ok(Category::Other),
            unknown => Err(VaultError::InvalidInput(format!("unknown category: {unknown}"))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAttachment {
    /// A `file://` URI or a plain filesystem path.
    pub uri: String,
    pub mime_type: Option<String>,
    pub display_name: Option<String>,
}

/// A user-facing vault entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Option<i64>,
    pub title: String,
    pub content: Option<String>,
    pub category: Category,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub attachment: Option<DocumentAttachment>,
}

const COLUMNS: &str =
    "id, title, content, category, timestamp, attachment_uri, attachment_mime_type, attachment_name";

impl Document {
    /// Create an unsaved document stamped with the current time.
    pub fn new(title: impl Into<String>, content: Option<String>, category: Category) -> Self {
        Self {
            id: None,
            title: title.into(),
            content,
            category,
            timestamp: chrono::Utc::now().timestamp_millis(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: DocumentAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Construct a Document from a database row selected with the standard column list.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let category: Option<String> = row.get(3)?;
        let uri: Option<String> = row.get(5)?;
        Ok(Self {
            id: row.get(0)?,
            title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            content: row.get(2)?,
            category: category
                .as_deref()
                .map(Category::from_stored)
                .unwrap_or(Category::Other),
            timestamp: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            attachment: match uri {
                Some(uri) => Some(DocumentAttachment {
                    uri,
                    mime_type: row.get(6)?,
                    display_name: row.get(7)?,
                }),
                None => None,
            },
        })
    }

    pub(crate) fn select_sql(tail: &str) -> String {
        format!("SELECT {COLUMNS} FROM documents {tail}")
    }

    /// Content shown in list views: the text, else the attachment name.
    pub fn preview(&self) -> &str {
        match (&self.content, &self.attachment) {
            (Some(text), _) if !text.trim().is_empty() => text.as_str(),
            (_, Some(att)) => att.display_name.as_deref().unwrap_or(&att.uri),
            _ => "",
        }
    }

    // ─── Static finders ──────────────────────────────────────────────────

    /// Find a document by its ID.
    pub fn find_by_id(conn: &Connection, id: i64) -> VaultResult<Option<Self>> {
        match conn.query_row(&Self::select_sql("WHERE id = ?1"), [id], Self::from_row) {
            Ok(doc) => Ok(Some(doc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VaultError::Database(e.to_string())),
        }
    }

    /// Change a document's category. Returns whether a row changed.
    pub fn update_category(conn: &Connection, id: i64, category: Category) -> VaultResult<bool> {
        let changed = conn
            .execute(
                "UPDATE documents SET category = ?1 WHERE id = ?2",
                params![category.as_str(), id],
            )
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Delete a document by ID. Returns whether a row was removed.
    pub fn delete(conn: &Connection, id: i64) -> VaultResult<bool> {
        let changed = conn
            .execute("DELETE FROM documents WHERE id = ?1", [id])
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Insert this document and record its new ID.
    pub fn save(&mut self, conn: &Connection) -> VaultResult<i64> {
        let (uri, mime, name) = match &self.attachment {
            Some(a) => (Some(&a.uri), a.mime_type.as_ref(), a.display_name.as_ref()),
            None => (None, None, None),
        };
        conn.execute(
            "INSERT INTO documents (
                title, content, category, timestamp,
                attachment_uri, attachment_mime_type, attachment_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.title,
                self.content,
                self.category.as_str(),
                self.timestamp,
                uri,
                mime,
                name,
            ],
        )
        .map_err(|e| VaultError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_conn;

    #[test]
    fn test_category_parsing() {
        assert_eq!("images".parse::<Category>().unwrap(), Category::Images);
        assert_eq!("SMS".parse::<Category>().unwrap(), Category::Messages);
        assert!("recipes".parse::<Category>().is_err());
        assert_eq!(Category::from_stored("recipes"), Category::Other);
    }

    #[test]
    fn test_save_and_find() {
        let conn = test_conn();
        let mut doc = Document::new("Passport", Some("scan pending".into()), Category::Text);
        let id = doc.save(&conn).unwrap();
        assert_eq!(doc.id, Some(id));

        let found = Document::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.title, "Passport");
        assert_eq!(found.category, Category::Text);
        assert!(found.attachment.is_none());
    }

    #[test]
    fn test_find_missing_is_none() {
        let conn = test_conn();
        assert!(Document::find_by_id(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn test_attachment_roundtrip() {
        let conn = test_conn();
        let mut doc = Document::new("Photo", None, Category::Images).with_attachment(
            DocumentAttachment {
                uri: "file:///tmp/p.jpg".into(),
                mime_type: Some("image/jpeg".into()),
                display_name: Some("p.jpg".into()),
            },
        );
        let id = doc.save(&conn).unwrap();
        let found = Document::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.attachment, doc.attachment);
        assert_eq!(found.preview(), "p.jpg");
    }

    #[test]
    fn test_legacy_sms_reads_as_messages() {
        let conn = test_conn();
        conn.execute(
            "INSERT INTO documents (title, category, timestamp) VALUES ('old', 'sms', 1)",
            [],
        )
        .unwrap();
        let id = conn.last_insert_rowid();
        let found = Document::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.category, Category::Messages);
    }

    #[test]
    fn test_update_category_and_delete() {
        let conn = test_conn();
        let mut doc = Document::new("Note", Some("x".into()), Category::Text);
        let id = doc.save(&conn).unwrap();

        assert!(Document::update_category(&conn, id, Category::Other).unwrap());
        assert_eq!(
            Document::find_by_id(&conn, id).unwrap().unwrap().category,
            Category::Other
        );
        assert!(!Document::update_category(&conn, id + 1, Category::Other).unwrap());

        assert!(Document::delete(&conn, id).unwrap());
        assert!(!Document::delete(&conn, id).unwrap());
    }
}
