use dotenv::dotenv;

pub struct Config {
    pub database_url: String,
    pub api_base_url: String,
    pub worker_count: usize,
    pub max_requests_per_second: u32,
    pub max_requests_per_minute: u32,
    pub max_weight_per_minute: u32,
    pub base_request_interval_ms: u64,
    pub max_attempts: u32,
    pub listing_lookback_days: i64,
    pub backfill_days: i64,
    pub kline_page_size: u32,
    pub targets_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://collector.db?mode=rwc".to_string()),
            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| "https://api.binance.com".to_string()),
            worker_count: env_or("WORKER_COUNT", 4),
            max_requests_per_second: env_or("MAX_REQUESTS_PER_SECOND", 10),
            max_requests_per_minute: env_or("MAX_REQUESTS_PER_MINUTE", 1000),
            max_weight_per_minute: env_or("MAX_WEIGHT_PER_MINUTE", 5000),
            base_request_interval_ms: env_or("BASE_REQUEST_INTERVAL_MS", 100),
            max_attempts: env_or("MAX_ATTEMPTS", 3),
            listing_lookback_days: env_or("LISTING_LOOKBACK_DAYS", 730),
            backfill_days: env_or("BACKFILL_DAYS", 30),
            kline_page_size: env_or("KLINE_PAGE_SIZE", 1000),
            targets_file: std::env::var("TARGETS_FILE").ok(),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
