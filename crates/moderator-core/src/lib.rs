//! Moderator Core - photo moderation pipeline.
//!
//! Takes batches of freshly uploaded profile photos from a queue, derives
//! per-photo signals (sharpness, faces and age, explicit content), applies a
//! fixed decision policy and publishes one result record per batch.
//!
//! # Architecture
//!
//! ```text
//! Queue → BatchJob → [Fetch → Decode → Sharpness | Faces | NSFW → Policy] × N → BatchResult → Channel
//! ```
//!
//! Every check fails closed: a signal that cannot be computed resolves to the
//! value that rejects the photo, never the one that approves it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use moderator_core::{Config, Moderator};
//!
//! #[tokio::main]
//! async fn main() -> moderator_core::Result<()> {
//!     let config = Config::load()?;
//!     let moderator = Moderator::new(config);
//!
//!     let result = moderator.check_file("./photo.jpg").await?;
//!     println!("{:?} {:?}", result.status, result.reason);
//!     Ok(())
//! }
//! ```

pub mod checks;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod queue;
pub mod signal;
pub mod types;

pub use config::Config;
pub use error::{
    ConfigError, FaceServiceError, ModeratorError, PipelineError, PipelineResult, QueueError,
    Result,
};
pub use pipeline::{BatchOrchestrator, PhotoProcessor};
pub use policy::{Decision, DecisionPolicy};
pub use queue::{JobQueue, RedisQueue, ResultPublisher, Worker, WorkerStats};
pub use signal::SignalOutcome;
pub use types::{
    BatchJob, BatchResult, BatchSummary, PhotoJob, PhotoResult, PhotoStatus, RejectReason,
    SignalSet,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Moderator - the main entry point for embedding the pipeline.
///
/// Owns the configuration and the batch orchestrator (with its loaded
/// models). The queue side is wired separately via [`Moderator::worker`].
pub struct Moderator {
    config: Config,
    orchestrator: BatchOrchestrator,
}

impl Moderator {
    /// Build the pipeline from configuration, loading models once.
    pub fn new(config: Config) -> Self {
        tracing::debug!("Initializing moderator v{}", VERSION);
        let processor = PhotoProcessor::from_config(&config);
        Self::with_processor(config, processor)
    }

    /// Build around an already-assembled processor.
    pub fn with_processor(config: Config, processor: PhotoProcessor) -> Self {
        let orchestrator = BatchOrchestrator::new(processor, &config.processing);
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn processor(&self) -> &PhotoProcessor {
        self.orchestrator.processor()
    }

    /// Moderate one in-memory image without touching the queue.
    pub async fn check_bytes(&self, media_id: &str, bytes: Vec<u8>) -> PhotoResult {
        self.processor().process_bytes(media_id, bytes).await
    }

    /// Moderate an image file from local disk.
    ///
    /// The media id is the file name. Unlike a failed download, an unreadable
    /// file is an error for the caller rather than a `failed` result.
    pub async fn check_file(&self, path: impl AsRef<std::path::Path>) -> Result<PhotoResult> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let media_id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.check_bytes(&media_id, bytes).await)
    }

    /// Decode a raw queue payload and moderate it.
    pub async fn moderate_payload(&self, payload: &str) -> Result<BatchResult> {
        let job = BatchJob::from_payload(payload)?;
        Ok(self.moderate(&job).await)
    }

    /// Moderate a full batch without touching the queue.
    pub async fn moderate(&self, job: &BatchJob) -> BatchResult {
        self.orchestrator.run(job).await
    }

    /// Turn this moderator into a queue worker.
    pub fn worker(
        self,
        queue: std::sync::Arc<dyn JobQueue>,
        publisher: std::sync::Arc<dyn ResultPublisher>,
    ) -> Worker {
        Worker::new(&self.config.queue, queue, publisher, self.orchestrator)
    }
}
