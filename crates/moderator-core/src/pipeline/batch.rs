//! Batch orchestration: one result per photo, in input order.

use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};

use crate::config::ProcessingConfig;
use crate::types::{BatchJob, BatchResult, PhotoResult};

use super::processor::PhotoProcessor;

/// Sequences per-photo moderation for a batch and builds the outbound record.
pub struct BatchOrchestrator {
    processor: PhotoProcessor,
    photo_delay: Duration,
    max_concurrent: usize,
}

impl BatchOrchestrator {
    pub fn new(processor: PhotoProcessor, config: &ProcessingConfig) -> Self {
        Self {
            processor,
            photo_delay: Duration::from_millis(config.photo_delay_ms),
            max_concurrent: config.max_concurrent_photos.max(1),
        }
    }

    pub fn processor(&self) -> &PhotoProcessor {
        &self.processor
    }

    /// Moderate every photo of a batch.
    ///
    /// Photo starts are spaced by the configured delay. With
    /// `max_concurrent_photos` above 1 several photos run at once, but
    /// results keep input order.
    pub async fn run(&self, job: &BatchJob) -> BatchResult {
        let start = Instant::now();
        tracing::info!(
            job_id = %job.job_id,
            batch_id = %job.batch_id,
            photos = job.photos.len(),
            "Processing batch"
        );

        let delay = self.photo_delay;
        let processor = &self.processor;
        // Pacing happens before admission, so starts stay `delay` apart
        // however many photos are in flight.
        let results: Vec<PhotoResult> = stream::iter(job.photos.iter().enumerate())
            .then(move |(i, photo)| async move {
                if i > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                photo
            })
            .map(|photo| processor.process(photo))
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let result = BatchResult::new(job, results, Utc::now());
        tracing::info!(
            job_id = %result.job_id,
            total = result.summary.total,
            approved = result.summary.approved,
            rejected = result.summary.rejected,
            failed = result.summary.failed(),
            reasons = ?result.summary.reasons,
            elapsed = ?start.elapsed(),
            "Batch complete"
        );
        result
    }
}
