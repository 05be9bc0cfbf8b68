//! Capture commands: turn an arriving message into a vault document.
//!
//! These stand in for the platform's "message received" hooks so capture
//! and email forwarding can be driven from scripts.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use console::style;

use vault_core::config::ConfigHandle;
use vault_core::error::VaultResult;
use vault_models::Document;
use vault_services::{
    CaptureService, DirectoryAttachmentSink, EventBus, IncomingSms, JsonExportSource,
    NotificationDispatcher,
};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum CaptureAction {
    /// Capture an SMS given as one or more PDU text segments.
    Sms {
        /// Originating address.
        #[arg(short, long)]
        sender: Option<String>,
        /// Message time in milliseconds since the epoch (defaults to now).
        #[arg(short, long, default_value = "0")]
        timestamp: i64,
        /// Message text segments, concatenated in order.
        #[arg(required = true)]
        segments: Vec<String>,
    },
    /// Capture the newest MMS from a provider export directory.
    Mms {
        /// Directory holding mms.json and parts/.
        #[arg(short, long)]
        source: PathBuf,
    },
}

fn print_captured(doc: &Document, format: OutputFormat) -> VaultResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(doc)?),
        OutputFormat::Text => {
            println!(
                "  {} Captured \"{}\" as document {}.",
                style("OK").green().bold(),
                doc.title,
                doc.id.unwrap_or_default()
            );
            if let Some(att) = &doc.attachment {
                println!("    Attachment: {}", att.uri);
            }
        }
    }
    Ok(())
}

pub async fn run(config: ConfigHandle, action: CaptureAction, format: OutputFormat) -> VaultResult<()> {
    let db = super::init_database(&config).await?;
    let attachments_dir = config.read().await.effective_attachments_dir()?;
    let sender = super::start_email_sender(&config).await;

    let capture = CaptureService::new(
        db.clone(),
        NotificationDispatcher::new(db, sender.clone()),
        EventBus::default(),
        Arc::new(DirectoryAttachmentSink::new(attachments_dir)),
    );

    let result = match action {
        CaptureAction::Sms {
            sender: from,
            timestamp,
            segments,
        } => capture
            .capture_sms(&IncomingSms {
                segments,
                sender: from,
                timestamp,
            })
            .and_then(|doc| print_captured(&doc, format)),
        CaptureAction::Mms { source } => JsonExportSource::open(source)
            .and_then(|source| capture.capture_latest_mms(&source))
            .and_then(|doc| match doc {
                Some(doc) => print_captured(&doc, format),
                None => {
                    println!("  {} No MMS in the export.", style("WARN").yellow().bold());
                    Ok(())
                }
            }),
    };

    sender.shutdown().await;
    result
}
