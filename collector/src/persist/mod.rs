//! Serialized persistence into the single-writer store

mod queue;
mod store;

pub use queue::PersistenceQueue;
pub use store::{CollectorStore, ListingRecord, SeaOrmStore, StoreBatch};
