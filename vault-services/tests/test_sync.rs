//! Message ingester integration tests.
//!
//! Runs full sync passes from an in-memory provider into a real database
//! and a temporary attachment directory.

mod common;

use common::InMemorySource;
use tempfile::TempDir;
use vault_core::error::VaultError;
use vault_models::models::settings::keys;
use vault_models::{queries, ProviderType, Settings, StoredMessage};
use vault_services::event_bus::AppEvent;
use vault_services::{DirectoryAttachmentSink, MessageSyncService};

const JPEG: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

fn mixed_source() -> InMemorySource {
    InMemorySource::default()
        .with_sms(1, "+15550001", "first")
        .with_sms(2, "+15550002", "second")
        .with_mms(
            7,
            Some("+15550007"),
            vec![
                (70, "text/plain", Some("hello"), None),
                (71, "image/jpeg", None, Some(JPEG)),
            ],
        )
}

#[test]
fn sync_stores_sms_and_mms_with_attachment() {
    let (db, _dir) = common::create_test_db();
    let files = TempDir::new().unwrap();
    let sink = DirectoryAttachmentSink::new(files.path().join("attachments"));
    let service = MessageSyncService::new(db.clone(), common::create_test_event_bus());

    let report = service.synchronize(&mixed_source(), &sink).unwrap();
    assert!(report.permitted);
    assert_eq!(report.sms_processed, 2);
    assert_eq!(report.mms_processed, 1);
    assert_eq!(report.new_messages, 3);
    assert_eq!(report.attachments_saved, 1);
    assert_eq!(report.skipped, 0);

    let conn = db.conn().unwrap();
    let mms = StoredMessage::find_by_provider_key(&conn, 7, ProviderType::Mms)
        .unwrap()
        .expect("mms stored");
    assert_eq!(mms.body.as_deref(), Some("hello"));
    assert_eq!(mms.address.as_deref(), Some("+15550007"));
    assert_eq!(mms.date, 1_700_000_007 * 1000);
    assert!(mms.has_attachments);

    let attachments = queries::load_attachments_for_message(&conn, mms.id.unwrap()).unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(attachments[0].provider_part_id, 71);
    assert_eq!(attachments[0].size_bytes, JPEG.len() as i64);
    assert_eq!(std::fs::read(&attachments[0].file_path).unwrap(), JPEG);

    let sms = StoredMessage::find_by_provider_key(&conn, 1, ProviderType::Sms)
        .unwrap()
        .expect("sms stored");
    assert_eq!(sms.body.as_deref(), Some("first"));
    assert!(!sms.has_attachments);

    assert!(Settings::get_i64(&conn, keys::LAST_SYNC_AT).unwrap().is_some());
}

#[test]
fn resync_is_idempotent() {
    let (db, _dir) = common::create_test_db();
    let files = TempDir::new().unwrap();
    let sink = DirectoryAttachmentSink::new(files.path());
    let service = MessageSyncService::new(db.clone(), common::create_test_event_bus());
    let source = mixed_source();

    service.synchronize(&source, &sink).unwrap();
    let second = service.synchronize(&source, &sink).unwrap();

    assert_eq!(second.sms_processed, 2);
    assert_eq!(second.mms_processed, 1);
    assert_eq!(second.new_messages, 0);
    assert_eq!(second.attachments_saved, 0);
    assert_eq!(second.attachments_existing, 1);

    let conn = db.conn().unwrap();
    assert_eq!(queries::count_messages(&conn).unwrap(), 3);
    let stats = db.stats().unwrap();
    assert_eq!(stats.message_attachments, 1);
}

#[test]
fn resync_keeps_attachment_flag() {
    let (db, _dir) = common::create_test_db();
    let files = TempDir::new().unwrap();
    let sink = DirectoryAttachmentSink::new(files.path());
    let service = MessageSyncService::new(db.clone(), common::create_test_event_bus());

    service.synchronize(&mixed_source(), &sink).unwrap();
    service.synchronize(&mixed_source(), &sink).unwrap();

    let conn = db.conn().unwrap();
    let mms = StoredMessage::find_by_provider_key(&conn, 7, ProviderType::Mms)
        .unwrap()
        .unwrap();
    assert!(mms.has_attachments);
}

#[test]
fn sync_without_permission_does_nothing() {
    let (db, _dir) = common::create_test_db();
    let files = TempDir::new().unwrap();
    let sink = DirectoryAttachmentSink::new(files.path());
    let bus = common::create_test_event_bus();
    let mut rx = bus.subscribe();
    let service = MessageSyncService::new(db.clone(), bus);

    let source = InMemorySource {
        denied: true,
        ..mixed_source()
    };
    let report = service.synchronize(&source, &sink).unwrap();

    assert!(!report.permitted);
    assert_eq!(report.sms_processed, 0);
    assert_eq!(queries::count_messages(&db.conn().unwrap()).unwrap(), 0);
    assert!(rx.try_recv().is_err(), "no events without permission");
}

#[test]
fn mms_without_text_gets_placeholder_and_unknown_sender() {
    let (db, _dir) = common::create_test_db();
    let files = TempDir::new().unwrap();
    let sink = DirectoryAttachmentSink::new(files.path());
    let service = MessageSyncService::new(db.clone(), common::create_test_event_bus());
    let source = InMemorySource::default().with_mms(3, None, vec![]);

    service.synchronize(&source, &sink).unwrap();

    let conn = db.conn().unwrap();
    let mms = StoredMessage::find_by_provider_key(&conn, 3, ProviderType::Mms)
        .unwrap()
        .unwrap();
    assert_eq!(mms.body.as_deref(), Some("(Empty message)"));
    assert_eq!(mms.address.as_deref(), Some("Unknown"));
    assert!(!mms.has_attachments);
}

#[test]
fn unreadable_part_is_skipped_but_message_kept() {
    let (db, _dir) = common::create_test_db();
    let files = TempDir::new().unwrap();
    let sink = DirectoryAttachmentSink::new(files.path());
    let service = MessageSyncService::new(db.clone(), common::create_test_event_bus());

    let mut source = InMemorySource::default().with_mms(
        5,
        Some("+1"),
        vec![(50, "image/png", None, Some(&b"png"[..]))],
    );
    source.part_data.clear();

    let report = service.synchronize(&source, &sink).unwrap();
    assert_eq!(report.mms_processed, 1);
    assert_eq!(report.attachments_saved, 0);
    assert_eq!(report.skipped, 1);

    let conn = db.conn().unwrap();
    let mms = StoredMessage::find_by_provider_key(&conn, 5, ProviderType::Mms)
        .unwrap()
        .unwrap();
    assert!(!mms.has_attachments);
}

#[test]
fn sync_emits_messages_updated() {
    let (db, _dir) = common::create_test_db();
    let files = TempDir::new().unwrap();
    let sink = DirectoryAttachmentSink::new(files.path());
    let bus = common::create_test_event_bus();
    let mut rx = bus.subscribe();
    let service = MessageSyncService::new(db, bus);

    service.synchronize(&mixed_source(), &sink).unwrap();

    let mut updated = None;
    while let Ok(event) = rx.try_recv() {
        if let AppEvent::MessagesUpdated { new_messages, attachments_saved, .. } = event {
            updated = Some((new_messages, attachments_saved));
        }
    }
    assert_eq!(updated, Some((3, 1)));
}

#[test]
fn failed_attachment_insert_rolls_back_and_removes_file() {
    let (db, _dir) = common::create_test_db();
    let files = TempDir::new().unwrap();
    let attachments_dir = files.path().join("attachments");
    let sink = DirectoryAttachmentSink::new(&attachments_dir);
    let service = MessageSyncService::new(db.clone(), common::create_test_event_bus());

    db.conn()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER fail_attachment BEFORE INSERT ON message_attachments
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

    let err = service.synchronize(&mixed_source(), &sink).unwrap_err();
    assert!(matches!(err, VaultError::Database(_)), "got {err:?}");

    let leftover = std::fs::read_dir(&attachments_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);

    let conn = db.conn().unwrap();
    assert!(StoredMessage::find_by_provider_key(&conn, 7, ProviderType::Mms)
        .unwrap()
        .is_none());
    for id in [1, 2] {
        assert!(StoredMessage::find_by_provider_key(&conn, id, ProviderType::Sms)
            .unwrap()
            .is_some());
    }
    assert!(Settings::get_i64(&conn, keys::LAST_SYNC_AT).unwrap().is_none());
}
