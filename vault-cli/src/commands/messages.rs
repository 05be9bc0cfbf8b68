//! Synchronized message commands.

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use vault_core::config::ConfigHandle;
use vault_core::error::VaultResult;
use vault_models::{queries, StoredMessage};
use vault_services::formatter;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum MessagesAction {
    /// List synchronized messages, newest first.
    List {
        /// Number of messages to skip.
        #[arg(short, long, default_value = "0")]
        offset: i64,
        /// Maximum number of messages to show.
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
    /// Show one message and its attachments.
    Show {
        /// Local message ID.
        id: i64,
    },
}

pub async fn run(
    config: ConfigHandle,
    action: MessagesAction,
    password: Option<&str>,
    format: OutputFormat,
) -> VaultResult<()> {
    let db = super::init_database(&config).await?;
    super::unlock(&db, password)?;
    let conn = db.conn()?;

    match action {
        MessagesAction::List { offset, limit } => {
            let messages = queries::list_messages(&conn, offset, limit)?;
            let total = queries::count_messages(&conn)?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({
                        "total": total,
                        "offset": offset,
                        "messages": messages,
                    }));
                }
                OutputFormat::Text => {
                    if messages.is_empty() {
                        println!("  No messages. Run `vault sync --source <dir>` first.");
                        return Ok(());
                    }
                    let mut table = Table::new();
                    table
                        .load_preset(UTF8_FULL)
                        .apply_modifier(UTF8_ROUND_CORNERS)
                        .set_content_arrangement(ContentArrangement::Dynamic);
                    table.set_header(vec!["ID", "Type", "Address", "Date", "Body", "Att"]);
                    for msg in &messages {
                        table.add_row(vec![
                            msg.id.unwrap_or_default().to_string(),
                            msg.provider_type.to_string(),
                            msg.address.clone().unwrap_or_default(),
                            formatter::format_timestamp(msg.date),
                            super::truncate(msg.body.as_deref().unwrap_or_default(), 40),
                            if msg.has_attachments { "yes".into() } else { String::new() },
                        ]);
                    }
                    println!("{table}");
                    println!(
                        "  Showing {}-{} of {total}",
                        offset + 1,
                        offset + messages.len() as i64
                    );
                }
            }
        }
        MessagesAction::Show { id } => {
            let Some(msg) = StoredMessage::find_by_id(&conn, id)? else {
                println!("  {} No message with ID {id}.", style("WARN").yellow().bold());
                return Ok(());
            };
            let attachments = queries::load_attachments_for_message(&conn, id)?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({
                        "message": msg,
                        "attachments": attachments,
                    }));
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        style(format!("{} #{}", msg.provider_type, msg.provider_id))
                            .bold()
                            .underlined()
                    );
                    println!("  From:   {}", msg.address.as_deref().unwrap_or("Unknown"));
                    println!("  Date:   {}", formatter::format_timestamp(msg.date));
                    println!("  Box:    {}", msg.box_type);
                    println!();
                    println!("{}", msg.body.as_deref().unwrap_or_default());

                    if !attachments.is_empty() {
                        println!();
                        println!("{}", style("Attachments").bold());
                        for att in &attachments {
                            println!(
                                "  - {} ({}, {})",
                                att.file_path,
                                att.content_type.as_deref().unwrap_or("unknown type"),
                                att.human_size()
                            );
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
