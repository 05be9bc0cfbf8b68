//! Database management commands.

use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, ContentArrangement};
use console::style;
use dialoguer::Confirm;

use vault_core::config::ConfigHandle;
use vault_core::error::{VaultError, VaultResult};
use vault_models::models::settings::keys;
use vault_models::Settings;
use vault_services::formatter;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum DbAction {
    /// Show database statistics.
    Stats,
    /// Run an integrity check.
    Check,
    /// Reset the database (WARNING: destroys all data, including messages).
    Reset,
    /// Show the database file path.
    Path,
}

pub async fn run(
    config: ConfigHandle,
    action: DbAction,
    password: Option<&str>,
    format: OutputFormat,
) -> VaultResult<()> {
    let db_path = config.read().await.effective_db_path()?;

    match action {
        DbAction::Stats => {
            let db = super::init_database(&config).await?;
            let stats = db.stats()?;

            let file_size = std::fs::metadata(&db_path).ok().map(|m| m.len());
            let wal_size = std::fs::metadata(db_path.with_extension("db-wal"))
                .ok()
                .map(|m| m.len());

            let conn = db.conn()?;
            let journal_mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .unwrap_or_else(|_| "unknown".to_string());
            let last_sync = Settings::get_i64(&conn, keys::LAST_SYNC_AT)?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({
                        "path": db_path.display().to_string(),
                        "tables": stats,
                        "file_size_bytes": file_size,
                        "wal_size_bytes": wal_size,
                        "journal_mode": journal_mode,
                        "last_sync_at": last_sync,
                    }));
                }
                OutputFormat::Text => {
                    println!("{}", style("Database Statistics").bold().underlined());
                    println!("  Path:          {}", db_path.display());
                    println!("  Journal mode:  {}", journal_mode);
                    println!("  Schema:        v{}", stats.schema_version);
                    println!(
                        "  Last sync:     {}",
                        last_sync
                            .map(formatter::format_timestamp)
                            .unwrap_or_else(|| "never".to_string())
                    );
                    println!();

                    let mut table = Table::new();
                    table
                        .load_preset(UTF8_FULL)
                        .apply_modifier(UTF8_ROUND_CORNERS)
                        .set_content_arrangement(ContentArrangement::Dynamic);

                    table.set_header(vec!["Table", "Row Count"]);
                    table.add_row(vec!["documents".to_string(), stats.documents.to_string()]);
                    table.add_row(vec!["messages".to_string(), stats.messages.to_string()]);
                    table.add_row(vec![
                        "message_attachments".to_string(),
                        stats.message_attachments.to_string(),
                    ]);
                    table.add_row(vec!["settings".to_string(), stats.settings.to_string()]);
                    println!("{table}");

                    println!();
                    println!("{}", style("Storage").bold().underlined());
                    if let Some(size) = file_size {
                        println!("  Database:      {}", super::format_bytes(size));
                    }
                    if let Some(size) = wal_size {
                        println!("  WAL file:      {}", super::format_bytes(size));
                    }
                }
            }
        }
        DbAction::Check => {
            println!("  {} Running integrity check...", style("...").dim());
            let db = super::init_database(&config).await?;

            match db.run_integrity_check() {
                Ok(()) => println!("  {} Integrity check passed.", style("OK").green().bold()),
                Err(e) => println!("  {} Integrity check failed: {}", style("FAIL").red().bold(), e),
            }

            let conn = db.conn()?;
            let mut stmt = conn
                .prepare("PRAGMA foreign_key_check")
                .map_err(|e| VaultError::Database(e.to_string()))?;
            let fk_violations: Vec<String> = stmt
                .query_map([], |row| {
                    let table: String = row.get(0)?;
                    let rowid: i64 = row.get(1)?;
                    let parent: String = row.get(2)?;
                    Ok(format!("{table} row {rowid} -> {parent}"))
                })
                .map_err(|e| VaultError::Database(e.to_string()))?
                .filter_map(|r| r.ok())
                .collect();

            if fk_violations.is_empty() {
                println!("  {} Foreign key constraints OK.", style("OK").green().bold());
            } else {
                println!(
                    "  {} {} foreign key violation(s):",
                    style("WARN").yellow().bold(),
                    fk_violations.len()
                );
                for v in fk_violations.iter().take(10) {
                    println!("    - {v}");
                }
                if fk_violations.len() > 10 {
                    println!("    ... and {} more", fk_violations.len() - 10);
                }
            }
        }
        DbAction::Reset => {
            let db = super::init_database(&config).await?;
            super::unlock(&db, password)?;

            println!(
                "  {} This will delete ALL local data, including synchronized messages and the password.",
                style("WARNING").red().bold()
            );
            println!("  Database: {}", db_path.display());

            let confirmed = Confirm::new()
                .with_prompt("  Are you sure you want to reset the database?")
                .default(false)
                .interact()
                .unwrap_or(false);

            if !confirmed {
                println!("  Reset cancelled.");
                return Ok(());
            }

            db.reset()?;
            println!("  {} Database reset complete.", style("OK").green().bold());
        }
        DbAction::Path => match format {
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"path": db_path.display().to_string()}));
            }
            OutputFormat::Text => println!("{}", db_path.display()),
        },
    }

    Ok(())
}
