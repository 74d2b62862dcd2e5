//! Bounded-concurrency dispatch

mod pool;

pub use pool::{TaskFailure, TaskResult, WorkUnit, WorkerPool};
