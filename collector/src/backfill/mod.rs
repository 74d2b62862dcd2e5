//! Paginated candle-history retrieval

mod backfiller;

pub use backfiller::HistoricalBackfiller;
