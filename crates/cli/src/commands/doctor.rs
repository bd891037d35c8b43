//! Doctor command - validate configuration and show status

use anyhow::Result;
use reecho_adapters::state::SqliteStore;
use reecho_domain::{CredentialStore, CriteriaStore};
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    database: CheckResult,
    accounts: CheckResult,
    criteria: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        database: CheckResult::error("Not checked"),
        accounts: CheckResult::error("Not checked"),
        criteria: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {}", e));
            None
        }
    };

    if let Some(ref config) = config {
        match SqliteStore::new(&config.general.state_db_path).await {
            Ok(store) => {
                report.database = CheckResult::ok(format!(
                    "Database opened: {}",
                    config.general.state_db_path.display()
                ));
                report.accounts = check_accounts(&store).await;
                report.criteria = check_criteria(&store).await;
            }
            Err(e) => {
                report.database = CheckResult::error(format!("Failed to open database: {}", e));
            }
        }
    }

    let checks = [&report.config, &report.database];
    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human(&report);
    }

    if report.overall == "error" {
        anyhow::bail!("Doctor found errors");
    }

    Ok(())
}

async fn check_accounts(store: &SqliteStore) -> CheckResult {
    match store.list_accounts().await {
        Ok(handles) if handles.is_empty() => {
            CheckResult::warn("No accounts registered; run 'reecho account add'")
        }
        Ok(handles) => CheckResult::ok(format!("{} account(s) registered", handles.len())),
        Err(e) => CheckResult::error(format!("Failed to list accounts: {}", e)),
    }
}

async fn check_criteria(store: &SqliteStore) -> CheckResult {
    match store.list_all().await {
        Ok(criteria) if criteria.is_empty() => {
            CheckResult::warn("No criteria stored; run 'reecho criteria set'")
        }
        Ok(criteria) => CheckResult::ok(format!("{} criterion(s) stored", criteria.len())),
        Err(e) => CheckResult::error(format!("Failed to list criteria: {}", e)),
    }
}

fn print_human(report: &DoctorReport) {
    println!("reecho doctor");
    println!();
    println!("  config:   [{}] {}", report.config.status, report.config.message);
    println!(
        "  database: [{}] {}",
        report.database.status, report.database.message
    );
    println!(
        "  accounts: [{}] {}",
        report.accounts.status, report.accounts.message
    );
    println!(
        "  criteria: [{}] {}",
        report.criteria.status, report.criteria.message
    );
    println!();
    println!("overall: {}", report.overall);
}
