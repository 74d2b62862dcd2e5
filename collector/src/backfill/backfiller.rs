//! Pages through candle history for a window, deduplicating page boundaries

use std::sync::Arc;

use tracing::{debug, warn};

use shared::models::{Interval, Kline};

use crate::exchange::error::ExchangeResult;
use crate::exchange::source::MarketDataSource;

/// Termination guard against a server that keeps answering full pages.
const MAX_PAGES: u32 = 100;

/// Retrieves the complete, non-overlapping candle sequence for a window,
/// despite the API returning bounded-size pages.
pub struct HistoricalBackfiller {
    source: Arc<dyn MarketDataSource>,
    page_size: u32,
}

impl HistoricalBackfiller {
    pub fn new(source: Arc<dyn MarketDataSource>, page_size: u32) -> Self {
        Self { source, page_size }
    }

    /// Fetch every candle with `start <= open_time` and
    /// `close_time <= end + interval` in ascending order, no duplicates.
    ///
    /// A full page may end on an incomplete bucket boundary, so its final
    /// candle is dropped and the cursor advanced past the last emitted
    /// candle's close; the dropped candle comes back as the first row of the
    /// next page. A short page is the end of available data. Rate-limit
    /// failures are retried inside the executor at the same cursor, so
    /// already-fetched pages are never reprocessed.
    pub async fn backfill(
        &self,
        symbol: &str,
        interval: Interval,
        start: i64,
        end: i64,
    ) -> ExchangeResult<Vec<Kline>> {
        let mut collected: Vec<Kline> = Vec::new();
        let mut cursor = start;
        let mut pages = 0u32;

        while cursor <= end {
            if pages >= MAX_PAGES {
                warn!(symbol, cursor, "page cap reached, stopping backfill early");
                break;
            }
            pages += 1;

            let mut page = self
                .source
                .klines(symbol, interval, Some(cursor), Some(end), self.page_size)
                .await?;
            if page.is_empty() {
                break;
            }

            let full = page.len() as u32 == self.page_size;
            if full && page.len() > 1 {
                page.pop();
            }
            let next_cursor = page.last().map(|k| k.close_time + 1).unwrap_or(cursor);

            for kline in page {
                if kline.open_time < start || kline.close_time > end + interval.millis() {
                    continue;
                }
                if collected.last().map_or(false, |prev| kline.open_time <= prev.open_time) {
                    continue;
                }
                collected.push(kline);
            }

            if !full {
                break;
            }
            if next_cursor <= cursor {
                // The server is not moving us forward; bail out instead of
                // spinning against the page cap.
                warn!(symbol, cursor, "pagination stalled, stopping backfill");
                break;
            }
            cursor = next_cursor;
        }

        debug!(symbol, candles = collected.len(), pages, "backfill window complete");
        Ok(collected)
    }
}
