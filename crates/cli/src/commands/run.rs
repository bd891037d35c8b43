//! Run command - periodic dispatch of collection cycles

use anyhow::{Context, Result};
use reecho_adapters::{
    state::SqliteStore,
    x::{XResharer, XTimelineSource},
};
use reecho_domain::usecases::{Collector, Dispatcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::args::RunArgs;
use crate::config::AppConfig;

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let dry_run = args.dry_run || config.general.dry_run;

    tracing::info!(
        dry_run = dry_run,
        once = args.once,
        interval_secs = config.poll.interval_secs,
        "Starting reecho run"
    );

    // Build dependencies
    let store = Arc::new(
        SqliteStore::new(&config.general.state_db_path)
            .await
            .context("Failed to initialize SQLite store")?,
    );

    let timeline = Arc::new(XTimelineSource::with_base_url(config.x.base_url.clone()));
    let resharer = Arc::new(XResharer::with_base_url(config.x.base_url.clone()));

    let collector = Collector::new(
        Arc::clone(&store),
        Arc::clone(&store),
        timeline,
        resharer,
        dry_run,
    );

    let dispatcher = Dispatcher::new(Arc::clone(&store), collector);

    if args.once {
        tracing::info!("Triggering single dispatch");
        let report = dispatcher.dispatch_once().await?;
        let scheduled = report.scheduled.len();
        // A one-shot run waits for its cycles instead of detaching them,
        // otherwise they would die with the process.
        report.join().await;
        tracing::info!(scheduled = scheduled, "Dispatch complete");
    } else {
        let poll_interval = Duration::from_secs(config.poll.interval_secs);
        let mut ticker = interval(poll_interval);

        // Set up graceful shutdown
        let shutdown = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
            tracing::info!("Shutdown signal received");
        };

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match dispatcher.dispatch_once().await {
                        Ok(report) => {
                            if !report.scheduled.is_empty() || report.skipped > 0 {
                                tracing::info!(
                                    scheduled = report.scheduled.len(),
                                    skipped = report.skipped,
                                    "Dispatched collection cycles"
                                );
                            }
                            report.detach();
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Dispatch failed");
                        }
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down gracefully");
                    break;
                }
            }
        }
    }

    tracing::info!("reecho run completed");
    Ok(())
}
