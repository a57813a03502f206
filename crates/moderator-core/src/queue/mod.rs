//! Work queue transport and the worker loop.
//!
//! Jobs arrive as JSON payloads on a list (blocking pop with a bounded wait)
//! and one [`BatchResult`] per job is published on a pub/sub channel.

pub mod redis;
pub mod worker;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::types::BatchResult;

pub use self::redis::RedisQueue;
pub use self::worker::{backoff_duration, Worker, WorkerStats};

/// Source of job payloads.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Wait up to `timeout` for the next payload; `None` when the wait expired.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<String>, QueueError>;
}

/// Sink for batch results.
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    /// Publish a result; returns the number of subscribers that received it.
    async fn publish(&self, result: &BatchResult) -> Result<usize, QueueError>;
}
