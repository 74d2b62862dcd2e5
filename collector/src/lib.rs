//! Historical market-data collector for newly listed trading pairs
//!
//! The pipeline discovers each pair's true listing timestamp, then backfills
//! minute-resolution candle history into the persisted store:
//!
//! - **Rate limiting**: adaptive budget shared by all workers ([`rate`])
//! - **Request execution**: retry/backoff with typed error classification
//!   ([`exchange`])
//! - **Listing discovery**: coarse-to-fine search for the first candle with
//!   genuine trading activity ([`listing`])
//! - **Backfill**: paginated, deduplicating history retrieval ([`backfill`])
//! - **Dispatch**: bounded-concurrency worker pool ([`worker`])
//! - **Persistence**: serialized single-writer batch sink ([`persist`])

pub mod rate;
pub mod exchange;
pub mod listing;
pub mod backfill;
pub mod worker;
pub mod persist;
pub mod pipeline;

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
