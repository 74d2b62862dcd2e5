//! Concurrency-limited dispatcher with per-item failure isolation

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Anything the pool can dispatch; the label names the item in failure
/// reports and progress logs.
pub trait WorkUnit: Send + 'static {
    fn label(&self) -> String;
}

impl WorkUnit for String {
    fn label(&self) -> String {
        self.clone()
    }
}

/// Structured per-item failure. One item failing never aborts the batch.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub label: String,
    pub reason: String,
}

pub type TaskResult<R> = Result<R, TaskFailure>;

/// Runs a task over every item with at most `concurrency` in flight.
pub struct WorkerPool {
    concurrency: usize,
    shutdown: Option<watch::Receiver<bool>>,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self { concurrency: concurrency.max(1), shutdown: None }
    }

    /// Pool that stops admitting new items once the watch channel flips to
    /// true; already-admitted tasks run to completion.
    pub fn with_shutdown(concurrency: usize, shutdown: watch::Receiver<bool>) -> Self {
        Self { concurrency: concurrency.max(1), shutdown: Some(shutdown) }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().map_or(false, |rx| *rx.borrow())
    }

    /// Dispatch `task` over `items`. The result vector always has exactly one
    /// entry per item, in input order: the success payload or a structured
    /// failure. Panics inside a task are isolated and reported as failures.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, task: F) -> Vec<TaskResult<R>>
    where
        T: WorkUnit,
        R: Send + 'static,
        F: Fn(T) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<(usize, TaskResult<R>)> = JoinSet::new();
        let mut meta: HashMap<tokio::task::Id, (usize, String)> = HashMap::new();
        let mut results: Vec<Option<TaskResult<R>>> = Vec::with_capacity(total);
        results.resize_with(total, || None);

        for (index, item) in items.into_iter().enumerate() {
            let label = item.label();
            if self.shutdown_requested() {
                results[index] = Some(Err(TaskFailure {
                    label,
                    reason: "skipped: shutdown requested".to_string(),
                }));
                continue;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("worker semaphore never closes");
            let task = task.clone();
            let task_label = label.clone();
            let handle = join_set.spawn(async move {
                let _permit = permit;
                let result = task(item).await.map_err(|err| TaskFailure {
                    label: task_label,
                    reason: format!("{err:#}"),
                });
                (index, result)
            });
            meta.insert(handle.id(), (index, label));
        }

        let mut done = 0usize;
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, (index, result))) => {
                    meta.remove(&id);
                    done += 1;
                    info!("processed {}/{}", done, total);
                    results[index] = Some(result);
                }
                Err(join_error) => {
                    // A panicked task still yields a structured failure.
                    if let Some((index, label)) = meta.remove(&join_error.id()) {
                        warn!("worker task for {} aborted: {}", label, join_error);
                        done += 1;
                        results[index] = Some(Err(TaskFailure {
                            label,
                            reason: format!("processing error: {join_error}"),
                        }));
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|slot| slot.expect("every admitted or skipped item produces a result"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn items(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("SYM{}USDT", i)).collect()
    }

    #[tokio::test]
    async fn one_rejection_leaves_the_rest_untouched() {
        let pool = WorkerPool::new(3);
        let results = pool
            .run(items(5), |symbol: String| async move {
                if symbol == "SYM2USDT" {
                    anyhow::bail!("unknown symbol");
                }
                Ok(symbol.len())
            })
            .await;

        assert_eq!(results.len(), 5);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
        let failure = results[2].as_ref().unwrap_err();
        assert_eq!(failure.label, "SYM2USDT");
        assert!(failure.reason.contains("unknown symbol"));
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_worker_count() {
        let pool = WorkerPool::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let in_flight_ref = in_flight.clone();
        let peak_ref = peak.clone();
        let results = pool
            .run(items(8), move |_symbol: String| {
                let in_flight = in_flight_ref.clone();
                let peak = peak_ref.clone();
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2, "more than 2 tasks in flight");
    }

    #[tokio::test]
    async fn a_panicking_task_becomes_a_structured_failure() {
        let pool = WorkerPool::new(2);
        let results = pool
            .run(items(3), |symbol: String| async move {
                if symbol == "SYM1USDT" {
                    panic!("boom");
                }
                Ok(())
            })
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[2].is_ok());
        let failure = results[1].as_ref().unwrap_err();
        assert_eq!(failure.label, "SYM1USDT");
        assert!(failure.reason.contains("processing error"));
    }

    #[tokio::test]
    async fn shutdown_skips_unadmitted_items() {
        let (tx, rx) = watch::channel(true);
        let pool = WorkerPool::with_shutdown(2, rx);
        let results = pool.run(items(4), |_symbol: String| async { Ok(()) }).await;

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.is_err()));
        assert!(results[0].as_ref().unwrap_err().reason.contains("shutdown"));
        drop(tx);
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let pool = WorkerPool::new(4);
        let results: Vec<TaskResult<()>> =
            pool.run(Vec::<String>::new(), |_: String| async { Ok(()) }).await;
        assert!(results.is_empty());
    }
}
