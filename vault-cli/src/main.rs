//! Vault CLI - Command-line interface for the personal document vault.
//!
//! Browses and edits vault documents, synchronizes SMS/MMS from a provider
//! export, captures arriving messages, and manages email forwarding.

mod commands;

use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::info;

use vault_core::config::{AppConfig, ConfigHandle};
use vault_core::error::VaultResult;
use vault_core::logging;

/// Vault - password-gated documents and captured messages.
#[derive(Parser)]
#[command(
    name = "vault",
    version,
    about = "Personal document vault CLI",
    long_about = "A command-line interface for the personal document vault.\n\
                   Stores notes, files and captured SMS/MMS behind a local password, \
                   with optional email forwarding."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Vault password. Prompted for when omitted and one is set.
    #[arg(short, long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Set, change or verify the vault password.
    Password {
        #[command(subcommand)]
        action: commands::password::PasswordAction,
    },
    /// List, add and manage documents.
    Docs {
        #[command(subcommand)]
        action: commands::docs::DocsAction,
    },
    /// Browse synchronized SMS/MMS.
    Messages {
        #[command(subcommand)]
        action: commands::messages::MessagesAction,
    },
    /// Synchronize messages from a provider export directory.
    Sync {
        /// Directory holding sms.json, mms.json and parts/.
        #[arg(short, long)]
        source: std::path::PathBuf,
    },
    /// Capture an arriving message as a document.
    Capture {
        #[command(subcommand)]
        action: commands::capture::CaptureAction,
    },
    /// Configure email forwarding.
    Email {
        #[command(subcommand)]
        action: commands::email::EmailAction,
    },
    /// Database management commands.
    Db {
        #[command(subcommand)]
        action: commands::db::DbAction,
    },
}

#[tokio::main]
async fn main() -> VaultResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from_file(Path::new(path))?,
        None => AppConfig::load_default()?,
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    // Initialize logging
    let log_dir = config.effective_log_dir()?;
    let _guard = logging::init_logging(&config.logging, &log_dir)?;

    let config_handle = ConfigHandle::new(config);
    let password = cli.password.as_deref();

    info!("Vault CLI v{}", vault_core::constants::APP_VERSION);

    // Dispatch to command handlers
    match cli.command {
        Commands::Password { action } => {
            commands::password::run(config_handle, action, password).await
        }
        Commands::Docs { action } => {
            commands::docs::run(config_handle, action, password, cli.format).await
        }
        Commands::Messages { action } => {
            commands::messages::run(config_handle, action, password, cli.format).await
        }
        Commands::Sync { source } => {
            commands::sync::run(config_handle, source, password, cli.format).await
        }
        Commands::Capture { action } => {
            commands::capture::run(config_handle, action, cli.format).await
        }
        Commands::Email { action } => {
            commands::email::run(config_handle, action, password, cli.format).await
        }
        Commands::Db { action } => {
            commands::db::run(config_handle, action, password, cli.format).await
        }
    }
}
