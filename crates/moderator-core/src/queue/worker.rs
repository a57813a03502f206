//! The queue worker loop: dequeue → moderate → publish.
//!
//! Each iteration is isolated: any failure is logged and followed by a
//! backoff, then the loop continues. Shutdown is observed between
//! iterations, so an in-flight batch always completes and is published.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use super::{JobQueue, ResultPublisher};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::pipeline::BatchOrchestrator;
use crate::types::{BatchJob, BatchResult, PhotoResult};

/// Upper bound for the iteration backoff.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Exponential backoff: `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}

/// Counters accumulated over a worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub batches: u64,
    pub photos: u64,
    pub failures: u64,
}

enum Iteration {
    Idle,
    Processed { photos: usize },
    /// Decoded but violated batch invariants; answered with failed results
    Invalid,
}

/// Long-running consumer of the moderation queue.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    publisher: Arc<dyn ResultPublisher>,
    orchestrator: BatchOrchestrator,
    poll_timeout: Duration,
    error_backoff_ms: u64,
}

impl Worker {
    pub fn new(
        config: &QueueConfig,
        queue: Arc<dyn JobQueue>,
        publisher: Arc<dyn ResultPublisher>,
        orchestrator: BatchOrchestrator,
    ) -> Self {
        Self {
            queue,
            publisher,
            orchestrator,
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            error_backoff_ms: config.error_backoff_ms,
        }
    }

    /// Run until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        let mut consecutive_failures: u32 = 0;

        tracing::info!(
            poll_timeout = ?self.poll_timeout,
            "Worker started, waiting for jobs"
        );

        while !*shutdown.borrow() {
            match self.iteration().await {
                Ok(Iteration::Idle) => {
                    consecutive_failures = 0;
                }
                Ok(Iteration::Processed { photos }) => {
                    consecutive_failures = 0;
                    stats.batches += 1;
                    stats.photos += photos as u64;
                }
                Ok(Iteration::Invalid) => {
                    consecutive_failures = 0;
                    stats.failures += 1;
                }
                Err(e) => {
                    stats.failures += 1;
                    let delay = backoff_duration(consecutive_failures, self.error_backoff_ms);
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    tracing::error!(error = %e, backoff = ?delay, "Worker iteration failed");

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        tracing::info!(
            batches = stats.batches,
            photos = stats.photos,
            failures = stats.failures,
            "Worker stopped"
        );
        stats
    }

    async fn iteration(&self) -> Result<Iteration, QueueError> {
        let Some(payload) = self.queue.dequeue(self.poll_timeout).await? else {
            return Ok(Iteration::Idle);
        };

        let job: BatchJob = serde_json::from_str(&payload)?;
        if let Err(e) = job.validate() {
            tracing::warn!(job_id = %job.job_id, error = %e, "Invalid job, publishing failed results");
            let reason = e.to_string();
            let results = job
                .photos
                .iter()
                .map(|photo| PhotoResult::failed(photo.media_id.clone(), &reason))
                .collect();
            let result = BatchResult::new(&job, results, Utc::now());
            self.publisher.publish(&result).await?;
            return Ok(Iteration::Invalid);
        }
        if job.retry_count > 0 {
            tracing::debug!(job_id = %job.job_id, retry_count = job.retry_count, "Retried job");
        }

        let result = self.orchestrator.run(&job).await;
        let receivers = self.publisher.publish(&result).await?;
        tracing::info!(
            job_id = %result.job_id,
            batch_id = %result.batch_id,
            receivers,
            "Result published"
        );

        Ok(Iteration::Processed {
            photos: result.results.len(),
        })
    }
}
