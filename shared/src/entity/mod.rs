pub mod symbols;
pub mod listing_analysis;
pub mod historical_klines;
