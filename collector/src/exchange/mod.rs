//! Exchange REST transport: client, retry executor, error taxonomy

pub mod error;
pub mod types;
pub mod client;
pub mod executor;
pub mod source;
pub mod mock;

pub use client::BinanceClient;
pub use error::{ExchangeError, ExchangeResult};
pub use executor::{RequestExecutor, RetryPolicy};
pub use source::{BinanceMarketData, MarketDataSource};
