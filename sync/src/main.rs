//! Playlog Sync - scheduled backup of play logs into a table store.
//!
//! The binary loads configuration from the environment, fetches each
//! configured user's play history from the source XML API, and upserts
//! it into the destination document using the playlog-engine
//! normalization and merge logic.

use clap::Parser;
use playlog_sync::config::Config;
use playlog_sync::dest::HttpTableStore;
use playlog_sync::orchestrator::Orchestrator;
use playlog_sync::source::HttpPlaySource;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "playlog-sync", about = "Back up play logs into a table store")]
struct Cli {
    /// Ignore the stored high-water mark and walk full history
    #[arg(long)]
    full_refetch: bool,

    /// Sync only these users (default: everyone configured)
    #[arg(long, value_delimiter = ',')]
    users: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playlog_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    if !cli.users.is_empty() {
        config.units.retain(|unit| cli.users.contains(&unit.user));
        if config.units.is_empty() {
            tracing::error!("--users matches no configured sync units");
            return ExitCode::from(2);
        }
    }

    let source = match HttpPlaySource::new(&config.source) {
        Ok(source) => Arc::new(source),
        Err(err) => {
            tracing::error!(error = %err, "cannot build source client");
            return ExitCode::from(2);
        }
    };
    let store = match HttpTableStore::new(&config.dest) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "cannot build destination client");
            return ExitCode::from(2);
        }
    };

    // Ctrl-C requests a clean stop; the orchestrator observes it between
    // records so no row is left half-written.
    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("stop requested, finishing current record");
                cancelled.store(true, Ordering::Relaxed);
            }
        });
    }

    tracing::info!(units = config.units.len(), "starting sync run");

    let orchestrator = Orchestrator::new(
        source,
        store,
        Arc::new(config),
        cli.full_refetch,
        cancelled,
    );
    let report = orchestrator.run().await;

    for unit in &report.units {
        if unit.is_failed() {
            tracing::error!(
                user = %unit.user,
                domain = %unit.domain,
                phase = %unit.phase,
                error = unit.error.as_deref().unwrap_or("unknown"),
                "unit failed"
            );
        }
    }
    let totals = report.totals();
    tracing::info!(
        fetched = totals.fetched,
        created = totals.created,
        updated = totals.updated,
        unchanged = totals.unchanged,
        skipped = totals.skipped,
        duplicates = totals.duplicates,
        rejected = totals.rejected,
        "sync run finished"
    );

    if report.any_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
