use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use storefront_sync::config::LoggingConfig;
use storefront_sync::scheduler::StaleSyncScheduler;
use storefront_sync::{
    AppConfig, BatchSummary, ExtractorRegistry, HttpFetcher, SqliteStore, SyncAuditReader, SyncManager, SyncOptions,
};

#[derive(Parser)]
#[command(
    name = "storefront-sync",
    about = "Keep storefront price and stock in step with marketplace listings",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone, Default)]
struct SyncFlags {
    /// Sync even when the product has sync disabled.
    #[arg(long)]
    force: bool,

    /// Override the product's auto-update-price flag for this run.
    #[arg(long)]
    update_price: Option<bool>,

    /// Override the product's auto-update-stock flag for this run.
    #[arg(long)]
    update_stock: Option<bool>,
}

impl From<SyncFlags> for SyncOptions {
    fn from(flags: SyncFlags) -> Self {
        SyncOptions {
            force_update: flags.force,
            update_price: flags.update_price,
            update_stock: flags.update_stock,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sync one product from its source listing.
    Sync {
        product_id: String,
        #[command(flatten)]
        flags: SyncFlags,
    },
    /// Sync several products in order, pausing between them.
    SyncMany {
        #[arg(required = true)]
        product_ids: Vec<String>,
        #[command(flatten)]
        flags: SyncFlags,
    },
    /// Sync every enabled product not synced within the staleness window.
    SyncStale,
    /// Show recent sync attempts for a product.
    History {
        product_id: String,
        #[arg(long, default_value_t = storefront_sync::audit::DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
    /// Show sync counts for the last 24 hours.
    Stats,
    /// Create the database tables.
    InitDb,
    /// Run the stale sync on its cron schedule until Ctrl-C.
    RunScheduler,
}

#[derive(Serialize)]
struct BatchOutput<T: Serialize> {
    summary: BatchSummary,
    results: T,
}

fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.filter))?;

    match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "storefront-sync.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("loading configuration")?;
    let _log_guard = init_tracing(&config.logging)?;

    let store = Arc::new(SqliteStore::connect(&config.database).await?);
    let reader = SyncAuditReader::new(store.clone(), store.clone());
    let build_manager = || -> Result<Arc<SyncManager>> {
        let fetcher = Arc::new(HttpFetcher::new(&config.scraper)?);
        let registry = ExtractorRegistry::with_default_extractors(fetcher, &config.sync.home_currency);
        Ok(Arc::new(SyncManager::new(
            store.clone(),
            store.clone(),
            registry,
            config.sync.clone(),
        )))
    };

    match cli.command {
        Commands::InitDb => {
            store.init_schema().await?;
            info!("Database schema ready at {}", config.database.url);
        }
        Commands::Sync { product_id, flags } => {
            let result = build_manager()?.sync_one(&product_id, &flags.into()).await;
            print_json(&result)?;
        }
        Commands::SyncMany { product_ids, flags } => {
            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let results = build_manager()?
                .sync_many_with_cancel(&product_ids, &flags.into(), &cancel)
                .await;
            print_json(&BatchOutput {
                summary: BatchSummary::from_results(&results),
                results,
            })?;
        }
        Commands::SyncStale => {
            let results = build_manager()?.sync_stale(&SyncOptions::default()).await?;
            print_json(&BatchOutput {
                summary: BatchSummary::from_results(&results),
                results,
            })?;
        }
        Commands::History { product_id, limit } => {
            print_json(&reader.history(&product_id, limit).await?)?;
        }
        Commands::Stats => {
            print_json(&reader.stats().await?)?;
        }
        Commands::RunScheduler => {
            let mut scheduler = StaleSyncScheduler::new(build_manager()?, config.scheduler.clone()).await?;
            scheduler.start().await?;
            info!("Scheduler running, press Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            scheduler.shutdown().await?;
            print_json(&scheduler.runner().stats().await)?;
        }
    }

    Ok(())
}
