//! Wire types for the exchange REST API

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use shared::models::Kline;

use super::error::{ExchangeError, ExchangeResult};

/// Parsed body plus the used-weight counter read from the response headers.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub value: T,
    pub used_weight: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    /// First tradable moment, epoch ms. Futures metadata exposes this; spot
    /// usually does not, in which case the candle scan takes over.
    #[serde(default)]
    pub onboard_date: Option<i64>,
}

/// Error body attached to non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

/// Kline rows arrive as fixed-position arrays:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
/// tradeCount, takerBuyBase, takerBuyQuote, ignore]`
pub fn parse_kline_row(row: &[Value]) -> ExchangeResult<Kline> {
    if row.len() < 11 {
        return Err(ExchangeError::Parse(format!(
            "kline row has {} fields, expected at least 11",
            row.len()
        )));
    }
    Ok(Kline {
        open_time: field_i64(row, 0)?,
        open: field_decimal(row, 1)?,
        high: field_decimal(row, 2)?,
        low: field_decimal(row, 3)?,
        close: field_decimal(row, 4)?,
        volume: field_decimal(row, 5)?,
        close_time: field_i64(row, 6)?,
        quote_volume: field_decimal(row, 7)?,
        trade_count: field_i64(row, 8)?,
        taker_buy_base_volume: field_decimal(row, 9)?,
        taker_buy_quote_volume: field_decimal(row, 10)?,
    })
}

pub fn parse_kline_rows(rows: &[Vec<Value>]) -> ExchangeResult<Vec<Kline>> {
    rows.iter().map(|row| parse_kline_row(row)).collect()
}

fn field_i64(row: &[Value], index: usize) -> ExchangeResult<i64> {
    row[index]
        .as_i64()
        .ok_or_else(|| ExchangeError::Parse(format!("field {} is not an integer: {}", index, row[index])))
}

fn field_decimal(row: &[Value], index: usize) -> ExchangeResult<Decimal> {
    let value = &row[index];
    // Prices come as strings; tolerate plain numbers too.
    if let Some(text) = value.as_str() {
        return text
            .parse()
            .map_err(|_| ExchangeError::Parse(format!("field {} is not a decimal: {}", index, text)));
    }
    value
        .as_f64()
        .and_then(Decimal::from_f64)
        .ok_or_else(|| ExchangeError::Parse(format!("field {} is not a decimal: {}", index, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> Vec<Value> {
        json!([
            1756684800000i64,
            "0.00140000",
            "0.00155000",
            "0.00138000",
            "0.00150000",
            "125000.50000000",
            1756684859999i64,
            "183.75000000",
            412,
            "61000.00000000",
            "90.10000000",
            "0"
        ])
        .as_array()
        .unwrap()
        .clone()
    }

    #[test]
    fn parses_a_fixed_position_row() {
        let kline = parse_kline_row(&sample_row()).unwrap();
        assert_eq!(kline.open_time, 1756684800000);
        assert_eq!(kline.close_time, 1756684859999);
        assert_eq!(kline.open, "0.00140000".parse().unwrap());
        assert_eq!(kline.trade_count, 412);
        assert!(kline.has_trading_activity());
    }

    #[test]
    fn rejects_a_truncated_row() {
        let row = sample_row()[..5].to_vec();
        assert!(matches!(parse_kline_row(&row), Err(ExchangeError::Parse(_))));
    }

    #[test]
    fn rejects_garbage_price_fields() {
        let mut row = sample_row();
        row[1] = json!("not-a-number");
        assert!(matches!(parse_kline_row(&row), Err(ExchangeError::Parse(_))));
    }

    #[test]
    fn symbol_info_deserializes_optional_onboard_date() {
        let with: SymbolInfo = serde_json::from_value(json!({
            "symbol": "NEWUSDT",
            "status": "TRADING",
            "baseAsset": "NEW",
            "quoteAsset": "USDT",
            "onboardDate": 1756684800000i64
        }))
        .unwrap();
        assert_eq!(with.onboard_date, Some(1756684800000));

        let without: SymbolInfo = serde_json::from_value(json!({
            "symbol": "NEWUSDT",
            "status": "TRADING",
            "baseAsset": "NEW",
            "quoteAsset": "USDT"
        }))
        .unwrap();
        assert!(without.onboard_date.is_none());
    }
}
