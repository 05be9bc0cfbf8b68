//! Document commands.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;

use vault_core::config::ConfigHandle;
use vault_core::error::{VaultError, VaultResult};
use vault_models::{queries, Category, Document, DocumentAttachment};
use vault_services::formatter;
use vault_services::{DocumentService, EventBus, NewDocument, NotificationDispatcher};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum DocsAction {
    /// List documents, newest first.
    List {
        /// Only show one category (text, images, media, messages, other).
        #[arg(long)]
        category: Option<Category>,
        /// Only show documents whose title or content contains this text.
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one document in full.
    Show {
        /// Document ID.
        id: i64,
    },
    /// Add a document.
    Add {
        /// Document title.
        #[arg(short, long)]
        title: String,
        /// Category (text, images, media, messages, other).
        #[arg(long, default_value = "text")]
        category: Category,
        /// Text content.
        #[arg(long)]
        content: Option<String>,
        /// File to attach.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Move a document to another category.
    Category {
        /// Document ID.
        id: i64,
        /// New category.
        category: Category,
    },
    /// Delete one document.
    Delete {
        /// Document ID.
        id: i64,
    },
    /// Delete every document.
    DeleteAll {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Count documents per category.
    Count,
    /// Send a document to the configured mailbox.
    Email {
        /// Document ID.
        id: i64,
    },
}

fn attachment_for(file: &Path) -> VaultResult<DocumentAttachment> {
    if !file.is_file() {
        return Err(VaultError::InvalidInput(format!(
            "{} is not a readable file",
            file.display()
        )));
    }
    let path = std::fs::canonicalize(file)?;
    Ok(DocumentAttachment {
        uri: path.to_string_lossy().into_owned(),
        mime_type: mime_guess::from_path(&path).first_raw().map(String::from),
        display_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
    })
}

fn print_document(doc: &Document) {
    println!("{}", style(&doc.title).bold().underlined());
    println!("  ID:        {}", doc.id.unwrap_or_default());
    println!("  Category:  {}", doc.category);
    println!("  Date:      {}", formatter::format_timestamp(doc.timestamp));
    if let Some(att) = &doc.attachment {
        println!(
            "  File:      {} ({})",
            att.display_name.as_deref().unwrap_or(&att.uri),
            att.mime_type.as_deref().unwrap_or("unknown type")
        );
        println!("  Location:  {}", att.uri);
    }
    if let Some(content) = &doc.content {
        println!();
        println!("{content}");
    }
}

pub async fn run(
    config: ConfigHandle,
    action: DocsAction,
    password: Option<&str>,
    format: OutputFormat,
) -> VaultResult<()> {
    let db = super::init_database(&config).await?;
    super::unlock(&db, password)?;

    // Only actions that may send mail start the email worker.
    let sends_mail = matches!(
        action,
        DocsAction::Email { .. } | DocsAction::Add { category: Category::Messages, .. }
    );
    let sender = if sends_mail {
        Some(super::start_email_sender(&config).await)
    } else {
        None
    };

    let mut service = DocumentService::new(db.clone(), EventBus::default());
    if let Some(sender) = &sender {
        service = service.with_dispatcher(NotificationDispatcher::new(db.clone(), sender.clone()));
    }

    let result = run_action(&service, &db, action, format);

    if let Some(sender) = sender {
        sender.shutdown().await;
    }
    result
}

fn run_action(
    service: &DocumentService,
    db: &vault_models::Database,
    action: DocsAction,
    format: OutputFormat,
) -> VaultResult<()> {
    match action {
        DocsAction::List { category, search } => {
            let mut docs = match &search {
                Some(term) => service.search(term)?,
                None => service.list(category)?,
            };
            if let (Some(category), Some(_)) = (category, &search) {
                docs.retain(|d| d.category == category);
            }

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&docs)?);
                }
                OutputFormat::Text => {
                    if docs.is_empty() {
                        println!("  No documents found.");
                        return Ok(());
                    }
                    let mut table = Table::new();
                    table
                        .load_preset(UTF8_FULL)
                        .apply_modifier(UTF8_ROUND_CORNERS)
                        .set_content_arrangement(ContentArrangement::Dynamic);
                    table.set_header(vec!["ID", "Title", "Category", "Date", "Preview"]);
                    for doc in &docs {
                        table.add_row(vec![
                            doc.id.unwrap_or_default().to_string(),
                            super::truncate(&doc.title, 30),
                            doc.category.to_string(),
                            formatter::format_timestamp(doc.timestamp),
                            super::truncate(doc.preview(), 40),
                        ]);
                    }
                    println!("{table}");
                    println!("  {} document(s)", docs.len());
                }
            }
        }
        DocsAction::Show { id } => match service.get(id)? {
            Some(doc) => match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
                OutputFormat::Text => print_document(&doc),
            },
            None => println!("  {} No document with ID {id}.", style("WARN").yellow().bold()),
        },
        DocsAction::Add {
            title,
            category,
            content,
            file,
        } => {
            let attachment = file.as_deref().map(attachment_for).transpose()?;
            let doc = service.add_document(NewDocument {
                title,
                content,
                category,
                attachment,
            })?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
                OutputFormat::Text => println!(
                    "  {} Saved document {} in {}.",
                    style("OK").green().bold(),
                    doc.id.unwrap_or_default(),
                    doc.category
                ),
            }
        }
        DocsAction::Category { id, category } => {
            if service.update_category(id, category)? {
                println!("  {} Document {id} moved to {category}.", style("OK").green().bold());
            } else {
                println!("  {} No document with ID {id}.", style("WARN").yellow().bold());
            }
        }
        DocsAction::Delete { id } => {
            if service.delete(id)? {
                println!("  {} Document {id} deleted.", style("OK").green().bold());
            } else {
                println!("  {} No document with ID {id}.", style("WARN").yellow().bold());
            }
        }
        DocsAction::DeleteAll { yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt("  Delete ALL documents? Synchronized messages are kept.")
                    .default(false)
                    .interact()
                    .unwrap_or(false);
            if !confirmed {
                println!("  Delete cancelled.");
                return Ok(());
            }
            let count = service.delete_all()?;
            println!("  {} Deleted {count} document(s).", style("OK").green().bold());
        }
        DocsAction::Count => {
            let conn = db.conn()?;
            let counts = queries::count_documents_by_category(&conn)?;
            match format {
                OutputFormat::Json => {
                    let map: serde_json::Map<String, serde_json::Value> = counts
                        .iter()
                        .map(|(c, n)| (c.to_string(), serde_json::json!(n)))
                        .collect();
                    println!("{}", serde_json::Value::Object(map));
                }
                OutputFormat::Text => {
                    let mut table = Table::new();
                    table
                        .load_preset(UTF8_FULL)
                        .apply_modifier(UTF8_ROUND_CORNERS);
                    table.set_header(vec!["Category", "Documents"]);
                    for (category, count) in &counts {
                        table.add_row(vec![category.to_string(), count.to_string()]);
                    }
                    println!("{table}");
                }
            }
        }
        DocsAction::Email { id } => {
            if service.forward(id)? {
                println!("  {} Document {id} queued for email.", style("OK").green().bold());
            } else {
                println!(
                    "  {} Email is not configured. Run `vault email configure` first.",
                    style("WARN").yellow().bold()
                );
            }
        }
    }
    Ok(())
}
