//! Message ingester.
//!
//! Copies the telephony provider's SMS and MMS inboxes into the vault:
//! - SMS rows are upserted by provider key
//! - MMS rows get a resolved sender, a body assembled from their text parts,
//!   and their non-text parts copied through an [`AttachmentSink`]
//!
//! Re-running a sync is cheap: existing messages and attachments are
//! recognized and left untouched.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use vault_core::error::VaultResult;
use vault_models::models::settings::keys;
use vault_models::{queries, Database, MessageAttachment, ProviderType, Settings, StoredMessage};

use crate::event_bus::{AppEvent, EventBus};
use crate::source::{self, AttachmentSink, MessageSource, MmsPart, ProviderMms, ProviderSms};

/// Phases of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Sms,
    Mms,
    Complete,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    /// False when the source refused read access; nothing else ran.
    pub permitted: bool,
    pub sms_processed: u64,
    pub mms_processed: u64,
    /// Messages that did not exist locally before this run.
    pub new_messages: u64,
    pub attachments_saved: u64,
    /// Attachments found already recorded and not copied again.
    pub attachments_existing: u64,
    /// Records or parts skipped after an error.
    pub skipped: u64,
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sms={}, mms={}, new={}, attachments={} (+{} existing), skipped={}",
            self.sms_processed,
            self.mms_processed,
            self.new_messages,
            self.attachments_saved,
            self.attachments_existing,
            self.skipped
        )
    }
}

/// Per-message attachment tally.
#[derive(Debug, Default)]
struct PartOutcome {
    saved: u64,
    existing: u64,
    skipped: u64,
}

impl PartOutcome {
    fn has_attachments(&self) -> bool {
        self.saved + self.existing > 0
    }
}

/// Service that synchronizes provider messages into the local store.
pub struct MessageSyncService {
    database: Database,
    event_bus: EventBus,
}

impl MessageSyncService {
    pub fn new(database: Database, event_bus: EventBus) -> Self {
        Self {
            database,
            event_bus,
        }
    }

    fn report_progress(&self, phase: SyncPhase, current: u64, total: Option<u64>) {
        self.event_bus.emit(AppEvent::SyncProgress {
            phase: format!("{phase:?}"),
            current,
            total,
        });
    }

    /// Run one full pass over the source.
    ///
    /// A source without read permission yields an empty report and no events.
    /// Provider and I/O failures on individual records are logged and counted
    /// as skipped. Any other error, such as a database failure, aborts the run.
    pub fn synchronize(
        &self,
        source: &dyn MessageSource,
        sink: &dyn AttachmentSink,
    ) -> VaultResult<SyncReport> {
        if !source.has_read_permission() {
            debug!("message source has no read permission, skipping sync");
            return Ok(SyncReport::default());
        }

        info!("starting message sync");
        let mut report = SyncReport {
            permitted: true,
            ..Default::default()
        };
        let before = queries::count_messages(&*self.database.conn()?)?;

        self.sync_sms(source, &mut report)?;
        self.sync_mms(source, sink, &mut report)?;

        let after = queries::count_messages(&*self.database.conn()?)?;
        report.new_messages = after.saturating_sub(before) as u64;

        {
            let conn = self.database.conn()?;
            Settings::set_i64(&conn, keys::LAST_SYNC_AT, chrono::Utc::now().timestamp_millis())?;
        }

        self.report_progress(SyncPhase::Complete, report.sms_processed + report.mms_processed, None);
        self.event_bus.emit(AppEvent::MessagesUpdated {
            sms_processed: report.sms_processed,
            mms_processed: report.mms_processed,
            new_messages: report.new_messages,
            attachments_saved: report.attachments_saved,
        });

        info!("message sync complete: {report}");
        Ok(report)
    }

    fn sync_sms(&self, source: &dyn MessageSource, report: &mut SyncReport) -> VaultResult<()> {
        let inbox = match source.sms_inbox() {
            Ok(rows) => rows,
            Err(e) if !e.is_skippable() => return Err(e),
            Err(e) => {
                warn!("failed to read sms inbox: {e}");
                report.skipped += 1;
                return Ok(());
            }
        };

        let total = inbox.len() as u64;
        self.report_progress(SyncPhase::Sms, 0, Some(total));
        let conn = self.database.conn()?;

        for (i, sms) in inbox.iter().enumerate() {
            match sms_to_message(sms).save(&conn) {
                Ok(_) => report.sms_processed += 1,
                Err(e) if !e.is_skippable() => return Err(e),
                Err(e) => {
                    warn!("sms {}: failed to store: {e}", sms.id);
                    report.skipped += 1;
                }
            }
            if (i + 1) % 100 == 0 {
                self.report_progress(SyncPhase::Sms, i as u64 + 1, Some(total));
            }
        }
        Ok(())
    }

    fn sync_mms(
        &self,
        source: &dyn MessageSource,
        sink: &dyn AttachmentSink,
        report: &mut SyncReport,
    ) -> VaultResult<()> {
        let inbox = match source.mms_inbox() {
            Ok(rows) => rows,
            Err(e) if !e.is_skippable() => return Err(e),
            Err(e) => {
                warn!("failed to read mms inbox: {e}");
                report.skipped += 1;
                return Ok(());
            }
        };

        let total = inbox.len() as u64;
        self.report_progress(SyncPhase::Mms, 0, Some(total));

        for (i, mms) in inbox.iter().enumerate() {
            match self.ingest_mms(source, sink, mms) {
                Ok(parts) => {
                    report.mms_processed += 1;
                    report.attachments_saved += parts.saved;
                    report.attachments_existing += parts.existing;
                    report.skipped += parts.skipped;
                }
                Err(e) if !e.is_skippable() => return Err(e),
                Err(e) => {
                    warn!("mms {}: failed to store: {e}", mms.id);
                    report.skipped += 1;
                }
            }
            self.report_progress(SyncPhase::Mms, i as u64 + 1, Some(total));
        }
        Ok(())
    }

    /// Store one MMS. The message row, its attachment rows and its
    /// attachment flag commit together or not at all; on rollback the files
    /// copied for this message are removed again.
    fn ingest_mms(
        &self,
        source: &dyn MessageSource,
        sink: &dyn AttachmentSink,
        mms: &ProviderMms,
    ) -> VaultResult<PartOutcome> {
        let parts = source.mms_parts(mms.id)?;
        let address = source::mms_sender(source, mms.id);
        let body = source::mms_body(source, mms.subject.as_deref(), &parts);

        let mut copied: Vec<PathBuf> = Vec::new();
        let result = self.database.transaction(|conn| {
            let mut message = StoredMessage {
                id: None,
                provider_id: mms.id,
                provider_type: ProviderType::Mms,
                address: Some(address),
                date: mms.timestamp_ms(),
                body: Some(body),
                box_type: mms.box_type,
                has_attachments: false,
            };
            let local_id = message.save(conn)?;

            let mut outcome = PartOutcome::default();
            for part in parts.iter().filter(|p| p.is_attachment()) {
                if MessageAttachment::exists(conn, local_id, part.id)? {
                    outcome.existing += 1;
                    continue;
                }
                match copy_part(source, sink, mms.id, part) {
                    Ok(Some(mut attachment)) => {
                        copied.push(PathBuf::from(&attachment.file_path));
                        attachment.message_id = local_id;
                        if attachment.insert(conn)? {
                            outcome.saved += 1;
                        } else {
                            outcome.existing += 1;
                        }
                    }
                    Ok(None) => debug!("mms {}: part {} was empty", mms.id, part.id),
                    Err(e) if !e.is_skippable() => return Err(e),
                    Err(e) => {
                        warn!("mms {}: skipping part {}: {e}", mms.id, part.id);
                        outcome.skipped += 1;
                    }
                }
            }

            if outcome.has_attachments() {
                StoredMessage::mark_has_attachments(conn, local_id)?;
            }
            Ok(outcome)
        });

        if result.is_err() {
            for path in &copied {
                if let Err(e) = sink.remove(path) {
                    warn!("mms {}: failed to remove {}: {e}", mms.id, path.display());
                }
            }
        }
        result
    }
}

fn sms_to_message(sms: &ProviderSms) -> StoredMessage {
    StoredMessage {
        id: None,
        provider_id: sms.id,
        provider_type: ProviderType::Sms,
        address: sms.address.clone(),
        date: sms.date,
        body: sms.body.clone(),
        box_type: sms.box_type,
        has_attachments: false,
    }
}

/// Copy one part through the sink. `Ok(None)` when no bytes were written.
fn copy_part(
    source: &dyn MessageSource,
    sink: &dyn AttachmentSink,
    mms_id: i64,
    part: &MmsPart,
) -> VaultResult<Option<MessageAttachment>> {
    let content_type = part.content_type.clone().unwrap_or_default();
    let file_name = source::build_attachment_name(
        mms_id,
        part.id,
        &content_type,
        part.content_location.as_deref(),
    );

    let mut reader = source.open_part(part.id)?;
    let (path, size) = sink.store(&file_name, &mut reader)?;
    if size == 0 {
        return Ok(None);
    }

    Ok(Some(MessageAttachment {
        id: None,
        message_id: 0,
        provider_part_id: part.id,
        file_path: path.to_string_lossy().into_owned(),
        content_type: Some(content_type),
        size_bytes: size as i64,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_report_display() {
        let report = SyncReport {
            permitted: true,
            sms_processed: 3,
            mms_processed: 2,
            new_messages: 5,
            attachments_saved: 1,
            attachments_existing: 0,
            skipped: 0,
        };
        let display = report.to_string();
        assert!(display.contains("sms=3"));
        assert!(display.contains("attachments=1"));
    }

    #[test]
    fn test_sms_to_message() {
        let msg = sms_to_message(&ProviderSms {
            id: 4,
            address: Some("+1".into()),
            date: 99,
            body: Some("hey".into()),
            box_type: 1,
        });
        assert_eq!(msg.provider_type, ProviderType::Sms);
        assert!(!msg.has_attachments);
        assert_eq!(msg.date, 99);
    }

    #[test]
    fn test_part_outcome() {
        let mut outcome = PartOutcome::default();
        assert!(!outcome.has_attachments());
        outcome.existing = 1;
        assert!(outcome.has_attachments());
    }
}
