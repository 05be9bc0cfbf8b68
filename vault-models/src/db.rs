//! Database initialization, connection pooling, and lifecycle management.
//!
//! Uses SQLite (WAL mode by default) behind an r2d2 connection pool.
//! Runs integrity checks on startup and applies versioned migrations.

use std::path::Path;
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{error, info, warn};

use vault_core::config::DatabaseConfig;
use vault_core::error::{VaultError, VaultResult};

use crate::migrations;
use crate::schema;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database wrapper providing initialization, pooling, and lifecycle management.
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
}

impl Database {
    /// Initialize the database at the given path with the provided configuration.
    ///
    /// This:
    /// 1. Creates the database file and parent directories if needed
    /// 2. Sets up connection pooling with the configured pragmas
    /// 3. Runs an integrity check if configured
    /// 4. Applies pending migrations
    pub fn init(db_path: &Path, config: &DatabaseConfig) -> VaultResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("initializing database at {}", db_path.display());

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .connection_customizer(Box::new(ConnectionCustomizer {
                wal_mode: config.wal_mode,
            }))
            .build(manager)
            .map_err(|e| VaultError::Pool(e.to_string()))?;

        let db = Self {
            pool: Arc::new(pool),
        };

        if config.integrity_check_on_startup {
            db.run_integrity_check()?;
        }

        {
            let conn = db.conn()?;
            schema::create_tables(&conn)?;
            migrations::run_migrations(&conn)?;
        }

        info!("database initialized successfully");
        Ok(db)
    }

    /// Get a connection from the pool.
    pub fn conn(&self) -> VaultResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| VaultError::Pool(e.to_string()))
    }

    /// Run a SQLite integrity check.
    pub fn run_integrity_check(&self) -> VaultResult<()> {
        let conn = self.conn()?;
        let result: String = conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(|e| VaultError::Database(e.to_string()))?;

        if result != "ok" {
            error!("database integrity check failed: {result}");
            return Err(VaultError::IntegrityCheck(result));
        }

        info!("database integrity check passed");
        Ok(())
    }

    /// Execute a function within a database transaction.
    ///
    /// The transaction is rolled back if `f` returns an error.
    pub fn transaction<T, F>(&self, f: F) -> VaultResult<T>
    where
        F: FnOnce(&Connection) -> VaultResult<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| VaultError::Database(e.to_string()))?;

        let result = f(&tx)?;

        tx.commit()
            .map_err(|e| VaultError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Get database statistics (row counts per table).
    pub fn stats(&self) -> VaultResult<DatabaseStats> {
        let conn = self.conn()?;

        let count = |table: &str| -> VaultResult<i64> {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            conn.query_row(&sql, [], |row| row.get(0))
                .map_err(|e| VaultError::Database(e.to_string()))
        };

        Ok(DatabaseStats {
            documents: count("documents")?,
            messages: count("messages")?,
            message_attachments: count("message_attachments")?,
            settings: count("settings")?,
            schema_version: migrations::get_schema_version(&conn)?,
        })
    }

    /// Reset the database by dropping and recreating all tables.
    ///
    /// This is the only operation that removes synchronized messages.
    pub fn reset(&self) -> VaultResult<()> {
        warn!("resetting database - all data will be lost");
        let conn = self.conn()?;
        schema::drop_tables(&conn)?;
        schema::create_tables(&conn)?;
        migrations::run_migrations(&conn)?;
        info!("database reset complete");
        Ok(())
    }
}

/// Database row count statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseStats {
    pub documents: i64,
    pub messages: i64,
    pub message_attachments: i64,
    pub settings: i64,
    pub schema_version: i32,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "documents={}, messages={}, message_attachments={}, settings={}, schema=v{}",
            self.documents, self.messages, self.message_attachments, self.settings,
            self.schema_version
        )
    }
}

/// r2d2 connection customizer that applies PRAGMA settings.
#[derive(Debug)]
struct ConnectionCustomizer {
    wal_mode: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        if self.wal_mode {
            // journal_mode returns a row, so query it rather than execute it
            conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        }

        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA busy_timeout=5000;
             PRAGMA foreign_keys=ON;",
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vault_core::constants::DB_SCHEMA_VERSION;

    fn test_db() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let config = DatabaseConfig::default();
        let db = Database::init(&path, &config).unwrap();
        (db, dir)
    }

    #[test]
    fn test_database_init_creates_parents() {
        let (db, dir) = test_db();
        assert!(dir.path().join("nested").join("test.db").exists());
        let stats = db.stats().unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.schema_version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn test_integrity_check() {
        let (db, _dir) = test_db();
        assert!(db.run_integrity_check().is_ok());
    }

    #[test]
    fn test_transaction_commits() {
        let (db, _dir) = test_db();
        let result = db.transaction(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)",
                rusqlite::params!["k", "v"],
            )
            .map_err(|e| VaultError::Database(e.to_string()))?;
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(db.stats().unwrap().settings, 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let (db, _dir) = test_db();
        let result: VaultResult<()> = db.transaction(|conn| {
            conn.execute("INSERT INTO settings (key, value) VALUES ('k', 'v')", [])
                .map_err(|e| VaultError::Database(e.to_string()))?;
            Err(VaultError::Internal("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(db.stats().unwrap().settings, 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let (db, _dir) = test_db();
        db.conn()
            .unwrap()
            .execute(
                "INSERT INTO messages (provider_id, provider_type, date) VALUES (1, 'SMS', 0)",
                [],
            )
            .unwrap();
        db.reset().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.messages, 0);
        assert_eq!(stats.schema_version, DB_SCHEMA_VERSION);
    }
}
