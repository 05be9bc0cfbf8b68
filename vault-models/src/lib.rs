//! Vault Models - Database schema, models, migrations, and queries.
//!
//! This crate owns all data persistence: SQLite database initialization,
//! the document, password, message and settings models, versioned
//! migrations, and query functions for common access patterns.

pub mod db;
pub mod schema;
pub mod models;
pub mod queries;
pub mod migrations;

// Re-export key types
pub use db::{Database, DatabaseStats, DbPool};
pub use models::attachment::MessageAttachment;
pub use models::document::{Category, Document, DocumentAttachment};
pub use models::message::{ProviderType, StoredMessage};
pub use models::settings::Settings;

/// In-memory connection with the full schema applied.
#[cfg(test)]
pub(crate) fn test_conn() -> rusqlite::Connection {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    schema::create_tables(&conn).unwrap();
    migrations::run_migrations(&conn).unwrap();
    conn
}
