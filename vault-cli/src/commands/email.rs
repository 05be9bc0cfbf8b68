//! Email forwarding settings commands.

use clap::Subcommand;
use console::style;
use dialoguer::Input;

use vault_core::config::{ConfigHandle, EmailConfig};
use vault_core::error::{VaultError, VaultResult};
use vault_services::{MailTransport, OutgoingEmail, SettingsService, SmtpMailTransport};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum EmailAction {
    /// Set SMTP settings. Missing values are prompted for.
    Configure {
        /// SMTP server host.
        #[arg(long)]
        host: Option<String>,
        /// SMTP port.
        #[arg(long)]
        port: Option<u16>,
        /// SMTP user, also used as the sender address.
        #[arg(long)]
        username: Option<String>,
        /// SMTP password.
        #[arg(long)]
        smtp_password: Option<String>,
        /// Recipient address(es), comma separated.
        #[arg(long)]
        recipient: Option<String>,
        /// Connect without STARTTLS.
        #[arg(long)]
        no_tls: bool,
    },
    /// Show the current settings (password hidden).
    Show,
    /// Remove all email settings, disabling forwarding.
    Clear,
    /// Send a test email right away and report the result.
    Test,
}

fn prompt(label: &str, current: &str) -> VaultResult<String> {
    Input::<String>::new()
        .with_prompt(format!("  {label}"))
        .with_initial_text(current)
        .allow_empty(true)
        .interact_text()
        .map_err(|e| VaultError::Internal(format!("failed to read input: {e}")))
}

pub async fn run(
    config: ConfigHandle,
    action: EmailAction,
    password: Option<&str>,
    format: OutputFormat,
) -> VaultResult<()> {
    let db = super::init_database(&config).await?;
    super::unlock(&db, password)?;
    let settings = SettingsService::new(config, db);

    match action {
        EmailAction::Configure {
            host,
            port,
            username,
            smtp_password,
            recipient,
            no_tls,
        } => {
            let current = settings.email_config()?;
            let host = match host {
                Some(h) => h,
                None => prompt("SMTP host", &current.host)?,
            };
            let port = match port {
                Some(p) => p,
                None => prompt("SMTP port", &current.port.to_string())?
                    .trim()
                    .parse()
                    .map_err(|_| VaultError::InvalidInput("port must be a number".into()))?,
            };
            let username = match username {
                Some(u) => u,
                None => prompt("SMTP username", &current.username)?,
            };
            let smtp_password = match smtp_password {
                Some(p) => p,
                None => super::prompt_password("SMTP password")?,
            };
            let recipient = match recipient {
                Some(r) => r,
                None => prompt("Recipient", &current.recipient)?,
            };

            let updated = EmailConfig {
                host,
                port,
                username,
                password: smtp_password,
                recipient,
                use_tls: !no_tls,
            };
            settings.save_email_config(&updated)?;

            if updated.is_configured() {
                println!("  {} Email forwarding enabled.", style("OK").green().bold());
            } else {
                println!(
                    "  {} Settings saved but incomplete; forwarding stays off.",
                    style("WARN").yellow().bold()
                );
            }
        }
        EmailAction::Show => {
            let email = settings.email_config()?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({
                        "configured": email.is_configured(),
                        "host": email.host,
                        "port": email.port,
                        "username": email.username,
                        "password_set": !email.password.is_empty(),
                        "recipient": email.recipient,
                        "use_tls": email.use_tls,
                    }));
                }
                OutputFormat::Text => {
                    let status = if email.is_configured() {
                        style("enabled").green()
                    } else {
                        style("disabled").dim()
                    };
                    println!("{}", style("Email forwarding").bold().underlined());
                    println!("  Status:     {status}");
                    println!("  Host:       {}:{}", email.host, email.port);
                    println!("  Username:   {}", email.username);
                    println!(
                        "  Password:   {}",
                        if email.password.is_empty() { "(not set)" } else { "********" }
                    );
                    println!("  Recipient:  {}", email.recipient);
                    println!("  STARTTLS:   {}", if email.use_tls { "yes" } else { "no" });
                }
            }
        }
        EmailAction::Clear => {
            settings.clear_email_config()?;
            println!("  {} Email settings cleared.", style("OK").green().bold());
        }
        EmailAction::Test => {
            let email_config = settings.email_config()?;
            if !email_config.is_configured() {
                return Err(VaultError::MissingConfig(
                    "email is not configured; run `vault email configure`".into(),
                ));
            }
            let email = OutgoingEmail::new(
                "Vault test email",
                "This is a test message from your vault. Email forwarding works.",
            );
            match SmtpMailTransport.deliver(&email_config, &email).await {
                Ok(()) => println!(
                    "  {} Test email sent to {}.",
                    style("OK").green().bold(),
                    email_config.recipient
                ),
                Err(e) => println!("  {} Test email failed: {e}", style("FAIL").red().bold()),
            }
        }
    }

    Ok(())
}
