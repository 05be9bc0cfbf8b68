//! Query functions for common access patterns.
//!
//! Documents and messages are always returned newest first. Category filters
//! expand each category to every stored value it covers, so documents saved
//! under the legacy `sms` value appear under messages.

use rusqlite::{params, params_from_iter, Connection};
use vault_core::error::{VaultError, VaultResult};

use crate::models::attachment::MessageAttachment;
use crate::models::document::{Category, Document};
use crate::models::message::StoredMessage;

// ─── Document Queries ───────────────────────────────────────────────────────

/// All documents, newest first.
pub fn list_documents(conn: &Connection) -> VaultResult<Vec<Document>> {
    let sql = Document::select_sql("ORDER BY timestamp DESC, id DESC");
    let mut stmt = conn.prepare(&sql).map_err(|e| VaultError::Database(e.to_string()))?;
    let docs = stmt
        .query_map([], Document::from_row)
        .map_err(|e| VaultError::Database(e.to_string()))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(docs)
}

/// Documents in one category, newest first.
pub fn list_documents_by_category(conn: &Connection, category: Category) -> VaultResult<Vec<Document>> {
    list_documents_by_categories(conn, &[category])
}

/// Documents in any of the given categories, newest first. An empty set matches nothing.
pub fn list_documents_by_categories(
    conn: &Connection,
    categories: &[Category],
) -> VaultResult<Vec<Document>> {
    let values = stored_values(categories);
    if values.is_empty() {
        return Ok(Vec::new());
    }

    let sql = Document::select_sql(&format!(
        "WHERE category IN ({}) ORDER BY timestamp DESC, id DESC",
        placeholders(values.len())
    ));
    let mut stmt = conn.prepare(&sql).map_err(|e| VaultError::Database(e.to_string()))?;
    let docs = stmt
        .query_map(params_from_iter(values.iter()), Document::from_row)
        .map_err(|e| VaultError::Database(e.to_string()))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(docs)
}

/// Case-insensitive substring search over titles and content, newest first.
pub fn search_documents(conn: &Connection, term: &str) -> VaultResult<Vec<Document>> {
    let pattern = format!("%{}%", term.trim());
    let sql = Document::select_sql(
        "WHERE title LIKE ?1 OR content LIKE ?1 ORDER BY timestamp DESC, id DESC",
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| VaultError::Database(e.to_string()))?;
    let docs = stmt
        .query_map([pattern], Document::from_row)
        .map_err(|e| VaultError::Database(e.to_string()))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(docs)
}

/// Delete every document. Returns the number of rows removed.
pub fn delete_all_documents(conn: &Connection) -> VaultResult<usize> {
    conn.execute("DELETE FROM documents", [])
        .map_err(|e| VaultError::Database(e.to_string()))
}

pub fn count_documents(conn: &Connection) -> VaultResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
        .map_err(|e| VaultError::Database(e.to_string()))
}

/// Document counts per category, in [`Category::ALL`] order.
pub fn count_documents_by_category(conn: &Connection) -> VaultResult<Vec<(Category, i64)>> {
    let mut stmt = conn
        .prepare("SELECT category, COUNT(*) FROM documents GROUP BY category")
        .map_err(|e| VaultError::Database(e.to_string()))?;
    let rows: Vec<(Option<String>, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| VaultError::Database(e.to_string()))?
        .filter_map(|r| r.ok())
        .collect();

    let mut counts: Vec<(Category, i64)> = Category::ALL.iter().map(|c| (*c, 0)).collect();
    for (value, n) in rows {
        let category = value
            .as_deref()
            .map(Category::from_stored)
            .unwrap_or(Category::Other);
        if let Some(slot) = counts.iter_mut().find(|(c, _)| *c == category) {
            slot.1 += n;
        }
    }
    Ok(counts)
}

// ─── Message Queries ────────────────────────────────────────────────────────

/// Synchronized messages, newest first, with offset pagination.
pub fn list_messages(conn: &Connection, offset: i64, limit: i64) -> VaultResult<Vec<StoredMessage>> {
    let sql = format!(
        "{} ORDER BY date DESC, id DESC LIMIT ?1 OFFSET ?2",
        StoredMessage::SELECT
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| VaultError::Database(e.to_string()))?;
    let messages = stmt
        .query_map(params![limit, offset], StoredMessage::from_row)
        .map_err(|e| VaultError::Database(e.to_string()))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(messages)
}

pub fn count_messages(conn: &Connection) -> VaultResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
        .map_err(|e| VaultError::Database(e.to_string()))
}

/// Attachments recorded for one message, in provider part order.
pub fn load_attachments_for_message(
    conn: &Connection,
    message_id: i64,
) -> VaultResult<Vec<MessageAttachment>> {
    let sql = format!(
        "{} WHERE message_id = ?1 ORDER BY provider_part_id ASC",
        MessageAttachment::SELECT
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| VaultError::Database(e.to_string()))?;
    let attachments = stmt
        .query_map([message_id], MessageAttachment::from_row)
        .map_err(|e| VaultError::Database(e.to_string()))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(attachments)
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn stored_values(categories: &[Category]) -> Vec<&'static str> {
    let mut values: Vec<&'static str> = Vec::new();
    for category in categories {
        for value in category.stored_values() {
            if !values.contains(value) {
                values.push(value);
            }
        }
    }
    values
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}
