//! Message sync command.

use std::path::PathBuf;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use vault_core::config::ConfigHandle;
use vault_core::error::{VaultError, VaultResult};
use vault_services::{
    AppEvent, DirectoryAttachmentSink, EventBus, JsonExportSource, MessageSyncService,
};

use crate::OutputFormat;

pub async fn run(
    config: ConfigHandle,
    source_dir: PathBuf,
    password: Option<&str>,
    format: OutputFormat,
) -> VaultResult<()> {
    let db = super::init_database(&config).await?;
    super::unlock(&db, password)?;
    let attachments_dir = config.read().await.effective_attachments_dir()?;

    println!(
        "  {} Syncing messages from {}...\n",
        style("SYNC").cyan().bold(),
        source_dir.display()
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let event_bus = EventBus::new(128);
    let mut rx = event_bus.subscribe();
    let pb_clone = pb.clone();
    let progress = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(AppEvent::SyncProgress { phase, current, total }) => {
                    let progress = match total {
                        Some(total) => format!(" ({current}/{total})"),
                        None => String::new(),
                    };
                    pb_clone.set_message(format!("[{phase}]{progress}"));
                }
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    // The ingester is synchronous; keep it off the async runtime.
    let report = tokio::task::spawn_blocking(move || {
        let source = JsonExportSource::open(source_dir)?;
        let sink = DirectoryAttachmentSink::new(attachments_dir);
        MessageSyncService::new(db, event_bus).synchronize(&source, &sink)
    })
    .await
    .map_err(|e| VaultError::Internal(format!("sync task failed: {e}")))??;

    if let Err(e) = progress.await {
        warn!("progress task ended abnormally: {e}");
    }
    pb.finish_and_clear();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if !report.permitted {
                println!(
                    "  {} The message source refused read access; nothing synced.",
                    style("WARN").yellow().bold()
                );
                return Ok(());
            }
            println!("  {} Sync complete.\n", style("OK").green().bold());
            println!("    SMS processed:        {}", report.sms_processed);
            println!("    MMS processed:        {}", report.mms_processed);
            println!("    New messages:         +{}", report.new_messages);
            println!("    Attachments saved:    +{}", report.attachments_saved);
            if report.attachments_existing > 0 {
                println!("    Attachments present:  {}", report.attachments_existing);
            }
            if report.skipped > 0 {
                println!(
                    "    {} {} record(s) skipped, see the log for details",
                    style("!").yellow().bold(),
                    report.skipped
                );
            }
        }
    }

    Ok(())
}
