//! Coarse-to-fine search for the first moment a pair genuinely traded

use std::sync::Arc;

use tracing::{info, warn};

use shared::models::Interval;

use crate::exchange::error::ExchangeResult;
use crate::exchange::source::MarketDataSource;

/// One candle per day covers the whole lookback window in a single page.
const DAILY_SCAN_LIMIT: u32 = 1000;
/// +-1 day around the first active day.
const HOURLY_SCAN_LIMIT: u32 = 72;
/// +-1 hour around the first active hour.
const MINUTE_SCAN_LIMIT: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOutcome {
    /// Epoch ms of the first candle showing genuine trading activity.
    Resolved(i64),
    /// The symbol has no discoverable trading history; a valid terminal
    /// outcome, not an error.
    NoData,
}

/// Finds the earliest timestamp with real trading activity. "First returned
/// candle" is not good enough: exchanges pre-register symbols with
/// zero-volume placeholder candles, so each stage scans for volume and a
/// positive price instead.
pub struct ListingDateResolver {
    source: Arc<dyn MarketDataSource>,
    lookback_days: i64,
}

impl ListingDateResolver {
    pub fn new(source: Arc<dyn MarketDataSource>, lookback_days: i64) -> Self {
        Self { source, lookback_days }
    }

    /// Resolve the listing timestamp for `symbol`, searching backwards from
    /// `now_ms` over the configured lookback window.
    pub async fn resolve(&self, symbol: &str, now_ms: i64) -> ExchangeResult<ListingOutcome> {
        // Stage 1: an explicit onboarding timestamp from exchange metadata is
        // the cheapest and most authoritative answer.
        match self.source.symbol_info(symbol).await {
            Ok(Some(meta)) => {
                if let Some(onboard) = meta.onboard_date {
                    info!(symbol, onboard, "listing date taken from exchange metadata");
                    return Ok(ListingOutcome::Resolved(onboard));
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(symbol, "metadata lookup failed, falling back to candle scan: {err}");
            }
        }

        // Stage 2: coarse daily scan over the lookback window.
        let window_start = now_ms - self.lookback_days * Interval::OneDay.millis();
        let days = self
            .source
            .klines(symbol, Interval::OneDay, Some(window_start.max(0)), Some(now_ms), DAILY_SCAN_LIMIT)
            .await?;
        let day = match days.iter().find(|k| k.has_trading_activity()) {
            Some(kline) => kline.open_time,
            None => {
                info!(symbol, "no trading activity inside the lookback window");
                return Ok(ListingOutcome::NoData);
            }
        };

        // Stage 3: hourly refinement around the first active day.
        let hour = self
            .refine(symbol, Interval::OneHour, day - Interval::OneDay.millis(), day + Interval::OneDay.millis(), HOURLY_SCAN_LIMIT)
            .await
            .unwrap_or(day);

        // Stage 4: minute refinement around the first active hour.
        let minute = self
            .refine(symbol, Interval::OneMinute, hour - Interval::OneHour.millis(), hour + Interval::OneHour.millis(), MINUTE_SCAN_LIMIT)
            .await
            .unwrap_or(hour);

        info!(symbol, listing = minute, "listing date resolved");
        Ok(ListingOutcome::Resolved(minute))
    }

    /// Best-effort refinement: a failed or empty fetch keeps the coarser
    /// estimate instead of aborting the resolution.
    async fn refine(
        &self,
        symbol: &str,
        interval: Interval,
        start: i64,
        end: i64,
        limit: u32,
    ) -> Option<i64> {
        match self
            .source
            .klines(symbol, interval, Some(start.max(0)), Some(end), limit)
            .await
        {
            Ok(klines) => klines.iter().find(|k| k.has_trading_activity()).map(|k| k.open_time),
            Err(err) => {
                warn!(symbol, interval = %interval, "refinement fetch failed, keeping coarser estimate: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::error::ExchangeError;
    use crate::exchange::mock::{synthetic_series, MockMarketData};
    use crate::exchange::types::SymbolInfo;

    const DAY: i64 = 86_400_000;
    const HOUR: i64 = 3_600_000;
    const MINUTE: i64 = 60_000;
    const NOW: i64 = 100 * DAY;

    fn resolver(mock: MockMarketData) -> ListingDateResolver {
        ListingDateResolver::new(Arc::new(mock), 30)
    }

    #[tokio::test]
    async fn metadata_onboard_date_wins_outright() {
        let mock = MockMarketData::new().with_symbol(SymbolInfo {
            symbol: "NEWUSDT".into(),
            status: "TRADING".into(),
            base_asset: "NEW".into(),
            quote_asset: "USDT".into(),
            onboard_date: Some(42 * DAY),
        });
        let outcome = resolver(mock).resolve("NEWUSDT", NOW).await.unwrap();
        assert_eq!(outcome, ListingOutcome::Resolved(42 * DAY));
    }

    #[tokio::test]
    async fn first_active_daily_candle_refined_to_the_minute() {
        // Daily series starts 20 days back; index 5 is the first with volume.
        let daily_start = NOW - 20 * DAY;
        let listing_day = daily_start + 5 * DAY;
        // Within that day, trading starts at hour 7, minute 23.
        let listing_hour = listing_day + 7 * HOUR;
        let listing_minute = listing_hour + 23 * MINUTE;

        let mock = MockMarketData::new()
            .with_series("NEWUSDT", Interval::OneDay, synthetic_series(daily_start, 20, Interval::OneDay, 5))
            .with_series("NEWUSDT", Interval::OneHour, synthetic_series(listing_day - DAY, 48, Interval::OneHour, 31))
            .with_series("NEWUSDT", Interval::OneMinute, synthetic_series(listing_hour - HOUR, 120, Interval::OneMinute, 83));

        let outcome = resolver(mock).resolve("NEWUSDT", NOW).await.unwrap();
        assert_eq!(outcome, ListingOutcome::Resolved(listing_minute));
    }

    #[tokio::test]
    async fn failed_refinement_falls_back_to_the_daily_estimate() {
        let daily_start = NOW - 20 * DAY;
        let listing_day = daily_start + 5 * DAY;
        let mock = MockMarketData::new()
            .with_series("NEWUSDT", Interval::OneDay, synthetic_series(daily_start, 20, Interval::OneDay, 5));
        mock.fail_next_klines(Interval::OneHour, ExchangeError::Server { status: 503, message: "down".into() });
        mock.fail_next_klines(Interval::OneMinute, ExchangeError::Server { status: 503, message: "down".into() });

        let outcome = resolver(mock).resolve("NEWUSDT", NOW).await.unwrap();
        assert_eq!(outcome, ListingOutcome::Resolved(listing_day));
    }

    #[tokio::test]
    async fn placeholder_only_history_reports_no_data() {
        let daily_start = NOW - 20 * DAY;
        // Every candle is a zero-volume placeholder.
        let mock = MockMarketData::new()
            .with_series("NEWUSDT", Interval::OneDay, synthetic_series(daily_start, 20, Interval::OneDay, usize::MAX));
        let outcome = resolver(mock).resolve("NEWUSDT", NOW).await.unwrap();
        assert_eq!(outcome, ListingOutcome::NoData);
    }

    #[tokio::test]
    async fn metadata_failure_still_resolves_from_candles() {
        let daily_start = NOW - 20 * DAY;
        let listing_day = daily_start + 5 * DAY;
        let mock = MockMarketData::new()
            .with_series("NEWUSDT", Interval::OneDay, synthetic_series(daily_start, 20, Interval::OneDay, 5));
        mock.fail_next_symbol_info(ExchangeError::Network("dns".into()));

        let outcome = resolver(mock).resolve("NEWUSDT", NOW).await.unwrap();
        assert_eq!(outcome, ListingOutcome::Resolved(listing_day));
    }

    #[tokio::test]
    async fn daily_scan_failure_propagates_as_an_error() {
        let mock = MockMarketData::new();
        mock.fail_next_klines(Interval::OneDay, ExchangeError::Server { status: 500, message: "boom".into() });
        let result = resolver(mock).resolve("NEWUSDT", NOW).await;
        assert!(matches!(result, Err(ExchangeError::Server { .. })));
    }
}
