//! Criteria command - manage per-account reshare criteria

use anyhow::{Context, Result};
use reecho_adapters::state::SqliteStore;
use reecho_domain::usecases::{CriteriaService, SaveOutcome};
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::{CriteriaArgs, CriteriaCommands};
use crate::config::AppConfig;

pub async fn execute(args: CriteriaArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let store = Arc::new(
        SqliteStore::new(&config.general.state_db_path)
            .await
            .context("Failed to initialize SQLite store")?,
    );

    let service = CriteriaService::new(store);

    match args.command {
        CriteriaCommands::Set {
            handle,
            term,
            list_id,
        } => {
            let outcome = service
                .save(&handle, &term, &list_id)
                .await
                .context("Failed to save criterion")?;
            match outcome {
                SaveOutcome::Saved(criterion) => {
                    println!(
                        "Saved criterion for {}: term={} list_id={}",
                        criterion.handle, criterion.term, criterion.list_id
                    );
                }
                SaveOutcome::Cleared => {
                    println!("Cleared criterion for {}", handle);
                }
            }
        }
        CriteriaCommands::Show { handle } => match service.show(&handle).await? {
            Some(criterion) => {
                println!("handle:  {}", criterion.handle);
                println!("term:    {}", criterion.term);
                println!("list_id: {}", criterion.list_id);
            }
            None => {
                println!("No criterion stored for {}", handle);
            }
        },
        CriteriaCommands::Clear { handle } => {
            service.clear(&handle).await?;
            println!("Cleared criterion for {}", handle);
        }
        CriteriaCommands::List { json } => {
            let criteria = service.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&criteria)?);
            } else if criteria.is_empty() {
                println!("No criteria stored");
            } else {
                for criterion in criteria {
                    println!(
                        "{}: term={} list_id={}",
                        criterion.handle, criterion.term, criterion.list_id
                    );
                }
            }
        }
    }

    Ok(())
}
