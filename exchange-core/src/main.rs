use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use exchange_common::data::{snapshot, ConstraintRepository};
use exchange_core::{
    config::Settings,
    exchange::Exchange,
    service::{ExchangeManager, RefreshOutcome, UpdateRequest},
};

#[derive(Parser)]
#[command(name = "exchange-hub")]
#[command(about = "Loads and refreshes trading constraints for configured exchanges")]
enum Commands {
    /// Print the coins and pairs every exchange supports
    List,
    /// Refresh constraints periodically until Ctrl+C
    Renew {
        /// Seconds between refreshes; defaults to refresh.interval_secs
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Refresh constraints once and print the outcome
    Refresh,
    /// Write the registry and every exchange snapshot to a directory
    Export {
        #[arg(short, long)]
        dir: PathBuf,
        /// Also upsert the snapshots into the configured database
        #[arg(long)]
        database: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let command = Commands::parse();
    let settings = Settings::new().context("failed to load settings")?;

    let registry = Arc::new(
        snapshot::load_registry(&settings.registry_dir)
            .await
            .with_context(|| format!("failed to load registry from {}", settings.registry_dir))?,
    );

    let repository = match settings.database_options() {
        Some(options) => Some(ConstraintRepository::connect_lazy(&options)?),
        None => None,
    };

    let manager = ExchangeManager::new(settings.refresh_config());
    let names = settings.exchange_names();
    if names.is_empty() {
        warn!("No exchanges configured");
    }
    for &name in &names {
        let options = settings.adapter_options(name, repository.as_ref());
        manager.open(name, registry.clone(), options).await?;
    }

    match command {
        Commands::List => {
            for exchange in manager.all() {
                let coins: Vec<String> = exchange.coins().into_iter().map(|c| c.code).collect();
                let pairs: Vec<String> = exchange.pairs().iter().map(|p| p.symbol()).collect();
                println!("{} ({} coins, {} pairs)", exchange.name(), coins.len(), pairs.len());
                println!("  coins: {}", coins.join(", "));
                println!("  pairs: {}", pairs.join(", "));
            }
        }

        Commands::Renew { interval } => {
            let period = Duration::from_secs(interval.unwrap_or(settings.refresh.interval_secs));
            let outcome = manager
                .refresh(UpdateRequest::every(names.clone(), period))
                .await?;
            let RefreshOutcome::Scheduled(handle) = outcome else {
                anyhow::bail!("interval refresh did not start a schedule");
            };

            info!("Refreshing every {:?}. Press Ctrl+C to stop.", period);
            tokio::signal::ctrl_c().await?;
            info!("Shutting down refresh schedule...");
            handle.stop().await;
            manager.shutdown();
            info!("Refresh schedule stopped");
        }

        Commands::Refresh => {
            let outcome = manager
                .refresh(UpdateRequest::immediate(names.clone()))
                .await?;
            let RefreshOutcome::Completed(report) = outcome else {
                anyhow::bail!("immediate refresh was scheduled");
            };

            for (name, summary) in &report.succeeded {
                println!(
                    "{}: {} coins, {} pairs, {} skipped",
                    name, summary.coins, summary.pairs, summary.skipped
                );
            }
            for (name, reason) in &report.failed {
                println!("{}: FAILED {}", name, reason);
            }
            if !report.is_complete_success() {
                error!("{} exchange(s) failed to refresh", report.failed.len());
            }
        }

        Commands::Export { dir, database } => {
            snapshot::save_registry(&dir, &registry).await?;
            for exchange in manager.all() {
                let data = exchange.to_snapshot();
                snapshot::save_exchange(&dir, &data).await?;
                if database {
                    match &repository {
                        Some(repository) => {
                            repository.ensure_schema().await?;
                            repository.save_snapshot(&data).await?;
                        }
                        None => warn!("--database given but no database is configured"),
                    }
                }
            }
            info!("Export to {} complete", dir.display());
        }
    }

    Ok(())
}
