use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV bucket as returned by the exchange, timestamps in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub trade_count: i64,
    pub taker_buy_base_volume: Decimal,
    pub taker_buy_quote_volume: Decimal,
}

impl Kline {
    /// Whether this bucket shows genuine trading activity. Exchanges sometimes
    /// pre-register pairs with zero-volume placeholder candles before the real
    /// listing, so a candle only counts when both volume and price are positive.
    pub fn has_trading_activity(&self) -> bool {
        self.volume > Decimal::ZERO && self.open > Decimal::ZERO
    }

    pub fn open_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time)
    }
}

/// Candle bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    OneMinute,
    OneHour,
    OneDay,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::OneHour => "1h",
            Interval::OneDay => "1d",
        }
    }

    pub fn millis(&self) -> i64 {
        match self {
            Interval::OneMinute => 60_000,
            Interval::OneHour => 3_600_000,
            Interval::OneDay => 86_400_000,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a listing analysis row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
    Pending,
    Analyzed,
    NoData,
    Error,
}

impl DataStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataStatus::Pending => "pending",
            DataStatus::Analyzed => "analyzed",
            DataStatus::NoData => "no_data",
            DataStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for DataStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pair handed to the collector by the symbol-discovery step, with an
/// optional externally supplied listing-timestamp hint (epoch ms).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSymbol {
    pub symbol: String,
    #[serde(rename = "baseAsset")]
    pub base_asset: String,
    #[serde(rename = "quoteAsset")]
    pub quote_asset: String,
    #[serde(rename = "listingHint", default)]
    pub listing_hint: Option<i64>,
}
