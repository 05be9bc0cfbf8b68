//! Shared test utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use vault_core::config::{AppConfig, ConfigHandle, DatabaseConfig, EmailConfig};
use vault_core::error::{VaultError, VaultResult};
use vault_models::{Database, Settings};
use vault_services::event_bus::EventBus;
use vault_services::source::{MessageSource, MmsPart, ProviderMms, ProviderSms};
use vault_services::{MailTransport, OutgoingEmail};

/// Create a temporary database with migrations applied.
/// Returns the Database and the TempDir (must be held alive for the duration of the test).
pub fn create_test_db() -> (Database, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("test.db");
    let config = DatabaseConfig::default();
    let db = Database::init(&path, &config).expect("failed to init test database");
    (db, dir)
}

/// Create a ConfigHandle wrapping a default config.
pub fn create_test_config_handle() -> ConfigHandle {
    ConfigHandle::new(AppConfig::default())
}

/// Create an EventBus with a small buffer suitable for tests.
pub fn create_test_event_bus() -> EventBus {
    EventBus::new(64)
}

/// Complete SMTP settings pointing nowhere.
pub fn test_email_config() -> EmailConfig {
    EmailConfig {
        host: "smtp.example.com".into(),
        port: 587,
        username: "vault@example.com".into(),
        password: "secret".into(),
        recipient: "owner@example.com".into(),
        use_tls: true,
    }
}

/// Store complete SMTP settings in the database.
pub fn configure_email(db: &Database) {
    let conn = db.conn().expect("failed to get connection");
    Settings::save_email_config(&conn, &test_email_config()).expect("failed to save email config");
}

// ─── In-memory message source ──────────────────────────────────────────────

/// One MMS with its sender and parts; part bytes are keyed by part id.
pub struct FixtureMms {
    pub mms: ProviderMms,
    pub sender: Option<String>,
    pub parts: Vec<MmsPart>,
}

#[derive(Default)]
pub struct InMemorySource {
    pub denied: bool,
    pub sms: Vec<ProviderSms>,
    pub mms: Vec<FixtureMms>,
    pub part_data: HashMap<i64, Vec<u8>>,
}

impl InMemorySource {
    pub fn with_sms(mut self, id: i64, address: &str, body: &str) -> Self {
        self.sms.push(ProviderSms {
            id,
            address: Some(address.into()),
            date: 1_700_000_000_000 + id,
            body: Some(body.into()),
            box_type: 1,
        });
        self
    }

    /// Add an MMS. Parts are `(part_id, content_type, inline_text, bytes)`;
    /// parts with bytes get a data location.
    pub fn with_mms(
        mut self,
        id: i64,
        sender: Option<&str>,
        parts: Vec<(i64, &str, Option<&str>, Option<&[u8]>)>,
    ) -> Self {
        let mut fixture_parts = Vec::new();
        for (part_id, content_type, text, bytes) in parts {
            if let Some(bytes) = bytes {
                self.part_data.insert(part_id, bytes.to_vec());
            }
            fixture_parts.push(MmsPart {
                id: part_id,
                content_type: Some(content_type.into()),
                text: text.map(String::from),
                data_location: bytes.map(|_| format!("/provider/part/{part_id}")),
                ..Default::default()
            });
        }
        self.mms.push(FixtureMms {
            mms: ProviderMms {
                id,
                date_seconds: 1_700_000_000 + id,
                box_type: 1,
                subject: None,
            },
            sender: sender.map(String::from),
            parts: fixture_parts,
        });
        self
    }

    fn find(&self, mms_id: i64) -> Option<&FixtureMms> {
        self.mms.iter().find(|m| m.mms.id == mms_id)
    }
}

impl MessageSource for InMemorySource {
    fn has_read_permission(&self) -> bool {
        !self.denied
    }

    fn sms_inbox(&self) -> VaultResult<Vec<ProviderSms>> {
        Ok(self.sms.clone())
    }

    fn mms_inbox(&self) -> VaultResult<Vec<ProviderMms>> {
        Ok(self.mms.iter().map(|m| m.mms.clone()).collect())
    }

    fn mms_from_address(&self, mms_id: i64) -> VaultResult<Option<String>> {
        Ok(self.find(mms_id).and_then(|m| m.sender.clone()))
    }

    fn mms_parts(&self, mms_id: i64) -> VaultResult<Vec<MmsPart>> {
        Ok(self.find(mms_id).map(|m| m.parts.clone()).unwrap_or_default())
    }

    fn open_part(&self, part_id: i64) -> VaultResult<Box<dyn Read + Send>> {
        let bytes = self
            .part_data
            .get(&part_id)
            .cloned()
            .ok_or_else(|| VaultError::Provider(format!("part {part_id} has no data")))?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

// ─── Recording mail transport ──────────────────────────────────────────────

/// Mail transport that records every email instead of sending it.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("recorder lock poisoned").clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn deliver(&self, _config: &EmailConfig, email: &OutgoingEmail) -> VaultResult<()> {
        self.sent.lock().expect("recorder lock poisoned").push(email.clone());
        Ok(())
    }
}
