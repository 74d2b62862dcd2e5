use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use collector::backfill::HistoricalBackfiller;
use collector::exchange::{BinanceClient, BinanceMarketData, MarketDataSource, RequestExecutor, RetryPolicy};
use collector::listing::ListingDateResolver;
use collector::persist::{PersistenceQueue, SeaOrmStore};
use collector::pipeline::CollectorPipeline;
use collector::rate::{RateLimiter, RateLimits};
use collector::worker::WorkerPool;
use migration::{Migrator, MigratorTrait};
use shared::models::TargetSymbol;
use shared::{get_db_connection, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting listing collector...");
    let config = Config::from_env()?;

    // Unreachable storage is the one startup error worth dying for.
    let db = get_db_connection(&config.database_url).await?;
    Migrator::up(&db, None).await?;

    let limiter = RateLimiter::start(RateLimits {
        max_requests_per_second: config.max_requests_per_second,
        max_requests_per_minute: config.max_requests_per_minute,
        max_weight_per_minute: config.max_weight_per_minute,
        base_interval: std::time::Duration::from_millis(config.base_request_interval_ms),
    });
    let policy = RetryPolicy { max_attempts: config.max_attempts, ..Default::default() };
    let executor = RequestExecutor::new(limiter, policy);
    let client = BinanceClient::new(&config.api_base_url)?;
    let source: Arc<dyn MarketDataSource> = Arc::new(BinanceMarketData::new(client, executor));

    let store = Arc::new(SeaOrmStore::new(db));
    let queue = Arc::new(PersistenceQueue::start(store.clone(), 64));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown requested, finishing in-flight work");
            let _ = shutdown_tx.send(true);
        }
    });

    let targets = load_targets(&config, &store).await?;
    if targets.is_empty() {
        warn!("no target symbols to collect; exiting");
        queue.close().await;
        return Ok(());
    }

    let pipeline = Arc::new(CollectorPipeline::new(
        ListingDateResolver::new(source.clone(), config.listing_lookback_days),
        HistoricalBackfiller::new(source, config.kline_page_size),
        store,
        queue.clone(),
        WorkerPool::with_shutdown(config.worker_count, shutdown_rx),
        config.backfill_days,
    ));

    let summary = pipeline.run(targets).await;
    queue.close().await;
    info!("{}", summary);
    Ok(())
}

/// Targets come from the discovery step via the symbols table, or from an
/// explicit JSON file when TARGETS_FILE is set.
async fn load_targets(config: &Config, store: &SeaOrmStore) -> Result<Vec<TargetSymbol>> {
    if let Some(path) = &config.targets_file {
        let raw = tokio::fs::read_to_string(path).await?;
        let targets: Vec<TargetSymbol> = serde_json::from_str(&raw)?;
        info!("loaded {} targets from {}", targets.len(), path);
        return Ok(targets);
    }
    let targets = store.monitored_targets().await?;
    info!("loaded {} monitored symbols from the store", targets.len());
    Ok(targets)
}
