//! Seam between the collection algorithms and the exchange transport

use async_trait::async_trait;

use shared::models::{Interval, Kline};

use super::client::{BinanceClient, WEIGHT_EXCHANGE_INFO, WEIGHT_KLINES};
use super::error::{ExchangeError, ExchangeResult};
use super::executor::RequestExecutor;
use super::types::SymbolInfo;

/// What the listing resolver and backfiller need from the exchange. The
/// production implementation routes through the rate-limited executor; tests
/// script a mock.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Exchange metadata for one symbol, `None` when the exchange does not
    /// know it.
    async fn symbol_info(&self, symbol: &str) -> ExchangeResult<Option<SymbolInfo>>;

    /// Up to `limit` candles with open time inside `[start_time, end_time]`.
    async fn klines(
        &self,
        symbol: &str,
        interval: Interval,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: u32,
    ) -> ExchangeResult<Vec<Kline>>;
}

pub struct BinanceMarketData {
    client: BinanceClient,
    executor: RequestExecutor,
}

impl BinanceMarketData {
    pub fn new(client: BinanceClient, executor: RequestExecutor) -> Self {
        Self { client, executor }
    }
}

#[async_trait]
impl MarketDataSource for BinanceMarketData {
    async fn symbol_info(&self, symbol: &str) -> ExchangeResult<Option<SymbolInfo>> {
        let result = self
            .executor
            .execute(WEIGHT_EXCHANGE_INFO, || self.client.exchange_info(Some(symbol)))
            .await;
        match result {
            Ok(info) => Ok(info.symbols.into_iter().find(|s| s.symbol == symbol)),
            // The exchange answers 400 for symbols it has never listed.
            Err(ExchangeError::BadRequest { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: Interval,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: u32,
    ) -> ExchangeResult<Vec<Kline>> {
        self.executor
            .execute(WEIGHT_KLINES, || {
                self.client.klines(symbol, interval, start_time, end_time, limit)
            })
            .await
    }
}
