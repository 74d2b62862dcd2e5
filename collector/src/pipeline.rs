//! End-to-end collection pipeline: symbols in, persisted history out

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use shared::models::{DataStatus, Interval, TargetSymbol};

use crate::backfill::HistoricalBackfiller;
use crate::listing::{ListingDateResolver, ListingOutcome};
use crate::persist::{CollectorStore, PersistenceQueue, StoreBatch};
use crate::worker::{WorkUnit, WorkerPool};

/// Candle rows per write batch handed to the persistence queue.
const KLINE_BATCH_SIZE: usize = 1000;
/// Failed symbols get one extra pass before landing in the summary.
const MAX_PASSES: u32 = 2;

/// One symbol's trip through the pipeline.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub target: TargetSymbol,
    pub attempt: u32,
}

impl WorkUnit for WorkItem {
    fn label(&self) -> String {
        self.target.symbol.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Analyzed { candles: u64 },
    NoData,
}

/// Final report: per-item failures are recorded here, never raised.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub analyzed: usize,
    pub no_data: usize,
    pub candles_stored: u64,
    pub failed: Vec<(String, String)>,
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "collection finished: {} analyzed ({} candles stored), {} without data, {} failed",
            self.analyzed,
            self.candles_stored,
            self.no_data,
            self.failed.len()
        )?;
        for (symbol, reason) in &self.failed {
            write!(f, "\n  {}: {}", symbol, reason)?;
        }
        Ok(())
    }
}

pub struct CollectorPipeline {
    resolver: ListingDateResolver,
    backfiller: HistoricalBackfiller,
    store: Arc<dyn CollectorStore>,
    queue: Arc<PersistenceQueue>,
    pool: WorkerPool,
    backfill_days: i64,
}

impl CollectorPipeline {
    pub fn new(
        resolver: ListingDateResolver,
        backfiller: HistoricalBackfiller,
        store: Arc<dyn CollectorStore>,
        queue: Arc<PersistenceQueue>,
        pool: WorkerPool,
        backfill_days: i64,
    ) -> Self {
        Self { resolver, backfiller, store, queue, pool, backfill_days }
    }

    /// Process every target, retry the failures once, and report totals.
    /// Nothing in here aborts the batch: each symbol fails alone.
    pub async fn run(self: Arc<Self>, targets: Vec<TargetSymbol>) -> PipelineSummary {
        let mut summary = PipelineSummary::default();
        let mut pending: Vec<WorkItem> = targets
            .into_iter()
            .map(|target| WorkItem { target, attempt: 0 })
            .collect();
        info!("collecting history for {} symbols", pending.len());

        for pass in 0..MAX_PASSES {
            if pending.is_empty() {
                break;
            }
            let pipeline = self.clone();
            let results = self
                .pool
                .run(pending.clone(), move |item| {
                    let pipeline = pipeline.clone();
                    async move { pipeline.process_target(item).await }
                })
                .await;

            let mut failures = Vec::new();
            for (item, result) in pending.drain(..).zip(results) {
                match result {
                    Ok(ItemOutcome::Analyzed { candles }) => {
                        summary.analyzed += 1;
                        summary.candles_stored += candles;
                    }
                    Ok(ItemOutcome::NoData) => summary.no_data += 1,
                    Err(failure) => failures.push((item, failure)),
                }
            }

            if failures.is_empty() {
                break;
            }
            if pass + 1 == MAX_PASSES || self.pool.shutdown_requested() {
                summary.failed = failures
                    .into_iter()
                    .map(|(_, failure)| (failure.label, failure.reason))
                    .collect();
                break;
            }
            warn!("{} symbols failed, retrying once", failures.len());
            pending = failures
                .into_iter()
                .map(|(mut item, _)| {
                    item.attempt += 1;
                    item
                })
                .collect();
        }

        summary
    }

    async fn process_target(&self, item: WorkItem) -> Result<ItemOutcome> {
        let symbol = item.target.symbol.clone();

        // Symbol row first so the analysis and candle rows below have a
        // foreign-key target.
        self.queue
            .enqueue(StoreBatch::Symbols(vec![item.target.clone()]))
            .await?;
        let symbol_id = self
            .store
            .symbol_id(&symbol)
            .await?
            .context("symbol row missing after upsert")?;

        let prior = self.store.listing(symbol_id).await?;
        let already_analyzed = prior
            .as_ref()
            .filter(|p| p.data_status == DataStatus::Analyzed.as_str())
            .and_then(|p| p.listing_date);

        let listed_at = match already_analyzed {
            Some(listing) => listing,
            None => match self.discover_listing(&item, symbol_id).await? {
                Some(listing) => listing,
                None => return Ok(ItemOutcome::NoData),
            },
        };

        self.queue
            .enqueue(StoreBatch::Listing {
                symbol_id,
                listing_date: Some(listed_at),
                status: DataStatus::Analyzed,
                error_message: None,
            })
            .await?;

        // Resume from wherever a previous run stopped; candle inserts are
        // idempotent either way.
        let now_ms = Utc::now().timestamp_millis();
        let window_end = now_ms.min(listed_at + self.backfill_days * Interval::OneDay.millis());
        let resume_from = self
            .store
            .latest_open_time(symbol_id)
            .await?
            .map(|newest| newest + Interval::OneMinute.millis())
            .unwrap_or(listed_at)
            .max(listed_at);
        if resume_from > window_end {
            return Ok(ItemOutcome::Analyzed { candles: 0 });
        }

        let klines = self
            .backfiller
            .backfill(&symbol, Interval::OneMinute, resume_from, window_end)
            .await?;
        let mut stored = 0u64;
        for chunk in klines.chunks(KLINE_BATCH_SIZE) {
            stored += self
                .queue
                .enqueue(StoreBatch::Klines { symbol_id, klines: chunk.to_vec() })
                .await?;
        }
        info!(symbol = %symbol, stored, "backfill persisted");
        Ok(ItemOutcome::Analyzed { candles: stored })
    }

    /// Listing hint from the discovery step, else the resolver. Terminal
    /// outcomes (no_data, error) are recorded before returning.
    async fn discover_listing(&self, item: &WorkItem, symbol_id: i64) -> Result<Option<i64>> {
        if let Some(hint) = item.target.listing_hint {
            info!(symbol = %item.target.symbol, hint, "using externally supplied listing hint");
            return Ok(Some(hint));
        }
        let now_ms = Utc::now().timestamp_millis();
        match self.resolver.resolve(&item.target.symbol, now_ms).await {
            Ok(ListingOutcome::Resolved(listing)) => Ok(Some(listing)),
            Ok(ListingOutcome::NoData) => {
                self.queue
                    .enqueue(StoreBatch::Listing {
                        symbol_id,
                        listing_date: None,
                        status: DataStatus::NoData,
                        error_message: None,
                    })
                    .await?;
                Ok(None)
            }
            Err(err) => {
                self.queue
                    .enqueue(StoreBatch::Listing {
                        symbol_id,
                        listing_date: None,
                        status: DataStatus::Error,
                        error_message: Some(err.to_string()),
                    })
                    .await?;
                Err(err.into())
            }
        }
    }
}
