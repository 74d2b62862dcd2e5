//! Thin REST client for the two endpoints the collector consumes

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use shared::models::{Interval, Kline};

use super::error::{ExchangeError, ExchangeResult};
use super::types::{parse_kline_rows, ApiErrorBody, ApiResponse, ExchangeInfo};

/// Header carrying the authoritative used-weight counter.
const USED_WEIGHT_HEADER: &str = "x-mbx-used-weight-1m";
/// Provider error code for exceeding the request rate.
const CODE_TOO_MANY_REQUESTS: i64 = -1003;

/// Weight charged per endpoint, from the provider's published schedule.
pub const WEIGHT_KLINES: u32 = 2;
pub const WEIGHT_EXCHANGE_INFO: u32 = 20;

pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> ExchangeResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ExchangeError::from_transport)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// `GET /api/v3/exchangeInfo`, optionally narrowed to one symbol.
    pub async fn exchange_info(&self, symbol: Option<&str>) -> ExchangeResult<ApiResponse<ExchangeInfo>> {
        let mut url = format!("{}/api/v3/exchangeInfo", self.base_url);
        if let Some(symbol) = symbol {
            url.push_str(&format!("?symbol={}", symbol));
        }
        debug!("GET {}", url);
        let response = self.http.get(&url).send().await.map_err(ExchangeError::from_transport)?;
        let (body, used_weight) = Self::read_body(response).await?;
        let value: ExchangeInfo =
            serde_json::from_str(&body).map_err(|e| ExchangeError::Parse(e.to_string()))?;
        Ok(ApiResponse { value, used_weight })
    }

    /// `GET /api/v3/klines` for up to `limit` candles with open time inside
    /// `[start_time, end_time]` (epoch ms).
    pub async fn klines(
        &self,
        symbol: &str,
        interval: Interval,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: u32,
    ) -> ExchangeResult<ApiResponse<Vec<Kline>>> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );
        if let Some(start) = start_time {
            url.push_str(&format!("&startTime={}", start));
        }
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={}", end));
        }
        debug!("GET {}", url);
        let response = self.http.get(&url).send().await.map_err(ExchangeError::from_transport)?;
        let (body, used_weight) = Self::read_body(response).await?;
        let rows: Vec<Vec<Value>> =
            serde_json::from_str(&body).map_err(|e| ExchangeError::Parse(e.to_string()))?;
        let value = parse_kline_rows(&rows)?;
        Ok(ApiResponse { value, used_weight })
    }

    /// Extract quota headers, classify non-success statuses, hand back the
    /// body text.
    async fn read_body(response: Response) -> ExchangeResult<(String, Option<u32>)> {
        let status = response.status();
        let used_weight = response
            .headers()
            .get(USED_WEIGHT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.map_err(ExchangeError::from_transport)?;
        if status.is_success() {
            return Ok((body, used_weight));
        }
        Err(Self::classify_status(status, retry_after, &body))
    }

    fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ExchangeError {
        let api_error: Option<ApiErrorBody> = serde_json::from_str(body).ok();
        let message = api_error
            .as_ref()
            .map(|e| e.msg.clone())
            .unwrap_or_else(|| body.chars().take(200).collect());
        let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
            || status.as_u16() == 418 // IP ban follow-up to ignored 429s
            || api_error.as_ref().map_or(false, |e| e.code == CODE_TOO_MANY_REQUESTS);
        if rate_limited {
            return ExchangeError::RateLimited { retry_after };
        }
        if status.is_server_error() {
            return ExchangeError::Server { status: status.as_u16(), message };
        }
        ExchangeError::BadRequest { status: status.as_u16(), message }
    }
}
