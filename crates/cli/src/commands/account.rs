//! Account command - register accounts and list them

use anyhow::{Context, Result};
use reecho_adapters::state::SqliteStore;
use reecho_domain::{CredentialStore, Credentials};
use secrecy::SecretString;
use std::path::PathBuf;

use crate::args::{AccountArgs, AccountCommands};
use crate::config::AppConfig;

pub async fn execute(args: AccountArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let store = SqliteStore::new(&config.general.state_db_path)
        .await
        .context("Failed to initialize SQLite store")?;

    match args.command {
        AccountCommands::Add {
            handle,
            key_env,
            secret_env,
        } => {
            let credentials = Credentials {
                key: load_secret(&key_env)?,
                secret: load_secret(&secret_env)?,
            };

            store.add_account(&handle, credentials).await?;
            println!("Registered account {}", handle);
        }
        AccountCommands::List => {
            let handles = store.list_accounts().await?;
            if handles.is_empty() {
                println!("No accounts registered");
            } else {
                for handle in handles {
                    println!("{}", handle);
                }
            }
        }
    }

    Ok(())
}

/// Secrets come from the environment, never from argv.
fn load_secret(env_var: &str) -> Result<SecretString> {
    let value = std::env::var(env_var)
        .with_context(|| format!("Environment variable {} is not set", env_var))?;

    if value.trim().is_empty() {
        anyhow::bail!("Environment variable {} is empty", env_var);
    }

    Ok(SecretString::new(value.into()))
}
