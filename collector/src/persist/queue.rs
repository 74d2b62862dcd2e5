//! FIFO write sink drained by exactly one loop
//!
//! The store tolerates a single writer transaction at a time; concurrent
//! workers committing directly would trip over each other's locks. All
//! writes therefore funnel through this queue, and each enqueuer awaits its
//! own commit result.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::store::{CollectorStore, StoreBatch};

struct QueueMessage {
    batch: StoreBatch,
    reply: oneshot::Sender<Result<u64>>,
}

pub struct PersistenceQueue {
    tx: Mutex<Option<mpsc::Sender<QueueMessage>>>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceQueue {
    /// Spawn the drain loop. Batches commit strictly in enqueue order; a
    /// failed commit reaches only the enqueuer that submitted it.
    pub fn start(store: Arc<dyn CollectorStore>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<QueueMessage>(capacity);
        let drain = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let result = store.commit(message.batch).await;
                if let Err(err) = &result {
                    error!("batch commit failed: {err:#}");
                }
                // The enqueuer may have given up; a dropped reply is fine.
                let _ = message.reply.send(result);
            }
            debug!("persistence queue drained");
        });
        Self {
            tx: Mutex::new(Some(tx)),
            drain: Mutex::new(Some(drain)),
        }
    }

    /// Resolves once the batch is durably committed (or its commit failed).
    pub async fn enqueue(&self, batch: StoreBatch) -> Result<u64> {
        let tx = self
            .tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("persistence queue is closed"))?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(QueueMessage { batch, reply: reply_tx })
            .await
            .map_err(|_| anyhow!("persistence queue is closed"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("persistence queue dropped the batch"))?
    }

    /// Stop accepting batches and wait until everything already enqueued has
    /// committed.
    pub async fn close(&self) {
        self.tx.lock().await.take();
        let handle = self.drain.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!("persistence drain loop aborted: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use crate::persist::store::ListingRecord;
    use shared::models::DataStatus;

    /// Store double that records commit order and fails on request.
    #[derive(Default)]
    struct RecordingStore {
        committed: StdMutex<Vec<i64>>,
        fail_symbol_ids: StdMutex<Vec<i64>>,
    }

    #[async_trait::async_trait]
    impl CollectorStore for RecordingStore {
        async fn commit(&self, batch: StoreBatch) -> Result<u64> {
            let StoreBatch::Klines { symbol_id, klines } = batch else {
                return Ok(0);
            };
            if self.fail_symbol_ids.lock().unwrap().contains(&symbol_id) {
                return Err(anyhow!("transaction rolled back"));
            }
            self.committed.lock().unwrap().push(symbol_id);
            Ok(klines.len() as u64)
        }

        async fn symbol_id(&self, _symbol: &str) -> Result<Option<i64>> {
            Ok(None)
        }

        async fn listing(&self, _symbol_id: i64) -> Result<Option<ListingRecord>> {
            Ok(None)
        }

        async fn latest_open_time(&self, _symbol_id: i64) -> Result<Option<i64>> {
            Ok(None)
        }
    }

    fn kline_batch(symbol_id: i64, count: usize) -> StoreBatch {
        use crate::exchange::mock::synthetic_series;
        use shared::models::Interval;
        StoreBatch::Klines {
            symbol_id,
            klines: synthetic_series(0, count, Interval::OneMinute, 0),
        }
    }

    #[tokio::test]
    async fn concurrent_batches_for_different_symbols_both_commit() {
        let store = Arc::new(RecordingStore::default());
        let queue = Arc::new(PersistenceQueue::start(store.clone(), 16));

        let first = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(kline_batch(1, 3)).await })
        };
        let second = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(kline_batch(2, 5)).await })
        };

        let counts = (first.await.unwrap().unwrap(), second.await.unwrap().unwrap());
        assert_eq!(counts, (3, 5));
        let mut committed = store.committed.lock().unwrap().clone();
        committed.sort_unstable();
        assert_eq!(committed, vec![1, 2]);
    }

    #[tokio::test]
    async fn a_failing_batch_reaches_only_its_own_enqueuer() {
        let store = Arc::new(RecordingStore::default());
        store.fail_symbol_ids.lock().unwrap().push(7);
        let queue = Arc::new(PersistenceQueue::start(store.clone(), 16));

        let failed = queue.enqueue(kline_batch(7, 2)).await;
        let ok = queue.enqueue(kline_batch(8, 2)).await;

        assert!(failed.is_err());
        assert_eq!(ok.unwrap(), 2);
        assert_eq!(store.committed.lock().unwrap().clone(), vec![8]);
    }

    #[tokio::test]
    async fn batches_commit_in_enqueue_order() {
        let store = Arc::new(RecordingStore::default());
        let queue = Arc::new(PersistenceQueue::start(store.clone(), 16));

        for symbol_id in 1..=5 {
            queue.enqueue(kline_batch(symbol_id, 1)).await.unwrap();
        }
        assert_eq!(store.committed.lock().unwrap().clone(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn close_drains_then_rejects_new_batches() {
        let store = Arc::new(RecordingStore::default());
        let queue = Arc::new(PersistenceQueue::start(store.clone(), 16));

        queue.enqueue(kline_batch(1, 1)).await.unwrap();
        queue.close().await;
        assert!(queue.enqueue(kline_batch(2, 1)).await.is_err());
        assert_eq!(store.committed.lock().unwrap().clone(), vec![1]);
    }

    #[tokio::test]
    async fn non_kline_batches_flow_through() {
        let store = Arc::new(RecordingStore::default());
        let queue = PersistenceQueue::start(store, 4);
        let written = queue
            .enqueue(StoreBatch::Listing {
                symbol_id: 1,
                listing_date: Some(1_700_000_000_000),
                status: DataStatus::Analyzed,
                error_message: None,
            })
            .await
            .unwrap();
        assert_eq!(written, 0);
    }
}
