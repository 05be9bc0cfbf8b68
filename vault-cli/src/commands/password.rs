//! Vault password commands.

use clap::Subcommand;
use console::style;
use dialoguer::Password;

use vault_core::config::ConfigHandle;
use vault_core::error::{VaultError, VaultResult};
use vault_models::models::auth;

#[derive(Subcommand)]
pub enum PasswordAction {
    /// Set the vault password for the first time.
    Set,
    /// Change the vault password.
    Change,
    /// Check a password against the stored one.
    Verify,
}

fn prompt_new_password() -> VaultResult<String> {
    let password = Password::new()
        .with_prompt("  New password")
        .with_confirmation("  Confirm password", "  Passwords do not match")
        .interact()
        .map_err(|e| VaultError::Internal(format!("failed to read password: {e}")))?;
    if password.is_empty() {
        return Err(VaultError::InvalidInput("password must not be empty".into()));
    }
    Ok(password)
}

pub async fn run(
    config: ConfigHandle,
    action: PasswordAction,
    password: Option<&str>,
) -> VaultResult<()> {
    let db = super::init_database(&config).await?;
    let conn = db.conn()?;

    match action {
        PasswordAction::Set => {
            if auth::has_password(&conn)? {
                println!(
                    "  {} A password is already set. Use `vault password change`.",
                    style("WARN").yellow().bold()
                );
                return Ok(());
            }
            let new = prompt_new_password()?;
            auth::set_password(&conn, &new)?;
            println!("  {} Vault password set.", style("OK").green().bold());
        }
        PasswordAction::Change => {
            if !auth::has_password(&conn)? {
                println!(
                    "  {} No password set yet. Use `vault password set`.",
                    style("WARN").yellow().bold()
                );
                return Ok(());
            }
            let current = match password {
                Some(p) => p.to_string(),
                None => super::prompt_password("Current password")?,
            };
            let new = prompt_new_password()?;
            auth::change_password(&conn, &current, &new)?;
            println!("  {} Vault password changed.", style("OK").green().bold());
        }
        PasswordAction::Verify => {
            let candidate = match password {
                Some(p) => p.to_string(),
                None => super::prompt_password("Password")?,
            };
            if auth::verify_password(&conn, &candidate)? {
                println!("  {} Password accepted.", style("OK").green().bold());
            } else {
                println!("  {} Password rejected.", style("FAIL").red().bold());
            }
        }
    }

    Ok(())
}
