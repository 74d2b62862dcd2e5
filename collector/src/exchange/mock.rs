//! Scripted in-memory market data source for tests and offline runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use shared::models::{Interval, Kline};

use super::error::{ExchangeError, ExchangeResult};
use super::source::MarketDataSource;
use super::types::SymbolInfo;

/// Scripted [`MarketDataSource`]: serves pre-seeded candle series, with
/// optional one-shot failures per interval for exercising fallback paths.
#[derive(Default)]
pub struct MockMarketData {
    symbols: HashMap<String, SymbolInfo>,
    series: HashMap<(String, &'static str), Vec<Kline>>,
    klines_failures: Mutex<HashMap<&'static str, ExchangeError>>,
    symbol_info_failure: Mutex<Option<ExchangeError>>,
    klines_requests: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, info: SymbolInfo) -> Self {
        self.symbols.insert(info.symbol.clone(), info);
        self
    }

    pub fn with_series(mut self, symbol: &str, interval: Interval, klines: Vec<Kline>) -> Self {
        self.series.insert((symbol.to_string(), interval.as_str()), klines);
        self
    }

    /// Fail the next klines request for this interval, then recover.
    pub fn fail_next_klines(&self, interval: Interval, error: ExchangeError) {
        self.klines_failures
            .lock()
            .expect("mock lock")
            .insert(interval.as_str(), error);
    }

    /// Fail the next symbol_info request, then recover.
    pub fn fail_next_symbol_info(&self, error: ExchangeError) {
        *self.symbol_info_failure.lock().expect("mock lock") = Some(error);
    }

    pub fn klines_requests(&self) -> usize {
        self.klines_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for MockMarketData {
    async fn symbol_info(&self, symbol: &str) -> ExchangeResult<Option<SymbolInfo>> {
        if let Some(error) = self.symbol_info_failure.lock().expect("mock lock").take() {
            return Err(error);
        }
        Ok(self.symbols.get(symbol).cloned())
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: Interval,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: u32,
    ) -> ExchangeResult<Vec<Kline>> {
        self.klines_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self
            .klines_failures
            .lock()
            .expect("mock lock")
            .remove(interval.as_str())
        {
            return Err(error);
        }
        let series = self
            .series
            .get(&(symbol.to_string(), interval.as_str()))
            .cloned()
            .unwrap_or_default();
        Ok(series
            .into_iter()
            .filter(|k| start_time.map_or(true, |s| k.open_time >= s))
            .filter(|k| end_time.map_or(true, |e| k.open_time <= e))
            .take(limit as usize)
            .collect())
    }
}

/// Build one synthetic candle; inactive candles mimic the zero-volume
/// placeholders exchanges register before a pair actually trades.
pub fn synthetic_kline(open_time: i64, interval: Interval, active: bool) -> Kline {
    let (price, volume) = if active {
        (Decimal::new(15, 1), Decimal::new(1000, 0))
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };
    Kline {
        open_time,
        close_time: open_time + interval.millis() - 1,
        open: price,
        high: price,
        low: price,
        close: price,
        volume,
        quote_volume: volume,
        trade_count: if active { 42 } else { 0 },
        taker_buy_base_volume: Decimal::ZERO,
        taker_buy_quote_volume: Decimal::ZERO,
    }
}

/// Contiguous series of `count` candles starting at `start`; candles before
/// `first_active` are placeholders.
pub fn synthetic_series(start: i64, count: usize, interval: Interval, first_active: usize) -> Vec<Kline> {
    (0..count)
        .map(|i| synthetic_kline(start + i as i64 * interval.millis(), interval, i >= first_active))
        .collect()
}
