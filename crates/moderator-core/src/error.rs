//! Error types for the moderation pipeline.
//!
//! Errors are organized by layer: configuration, per-photo pipeline stages,
//! the primary face-detection service, and the queue transport. Only the
//! queue and configuration errors ever reach the worker loop; per-photo
//! errors are turned into `failed` results or fail-closed signals.

use thiserror::Error;

/// Top-level error type for the embedding API on [`crate::Moderator`].
#[derive(Error, Debug)]
pub enum ModeratorError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed or invalid job payloads
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// A local image could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// An environment override could not be parsed
    #[error("Invalid value for {var}: {value:?}")]
    EnvError { var: String, value: String },

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-photo pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image download failed (transport error)
    #[error("Download failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Image download returned a non-success status
    #[error("Download failed for {url}: HTTP {status}")]
    FetchStatus { url: String, status: u16 },

    /// Downloaded payload exceeds the size limit
    #[error("Image too large: {url} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        url: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image decoding failed
    #[error("Decode error for {media_id}: {message}")]
    Decode { media_id: String, message: String },

    /// Image dimensions exceed limit
    #[error("Image too large: {media_id} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        media_id: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {media_id} after {timeout_ms}ms")]
    Timeout {
        media_id: String,
        stage: String,
        timeout_ms: u64,
    },

    /// A model could not be loaded
    #[error("Failed to load model {path}: {message}")]
    ModelLoad { path: String, message: String },

    /// Model inference failed
    #[error("Inference failed: {message}")]
    Inference { message: String },
}

/// Classified failures of the primary (network) face detector.
///
/// These never abort a photo: the processor records the marker and switches
/// to the fallback detector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaceServiceError {
    /// Could not connect to the detection service
    #[error("connection_failed")]
    Connection(String),

    /// The detection service did not answer in time
    #[error("timeout")]
    Timeout(String),

    /// The service answered with a body that matches no known envelope
    #[error("malformed_response")]
    MalformedResponse(String),

    /// Any other failure (HTTP status, body read error, ...)
    #[error("{0}")]
    Other(String),
}

impl FaceServiceError {
    /// Classify a reqwest error into connection / timeout / generic.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }

    /// Short machine-readable marker recorded on the photo's scores.
    pub fn marker(&self) -> String {
        self.to_string()
    }

    /// Human-oriented detail for logs.
    pub fn detail(&self) -> &str {
        match self {
            Self::Connection(d) | Self::Timeout(d) | Self::MalformedResponse(d) | Self::Other(d) => {
                d
            }
        }
    }
}

/// Queue transport and job payload errors.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Redis command or connection failure
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The job payload is not valid JSON for a batch job
    #[error("Malformed job payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The job payload decoded but violates batch invariants
    #[error("Invalid job {job_id}: {message}")]
    InvalidJob { job_id: String, message: String },
}

/// Convenience type alias for moderator results.
pub type Result<T> = std::result::Result<T, ModeratorError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_error_markers() {
        assert_eq!(
            FaceServiceError::Connection("refused".into()).marker(),
            "connection_failed"
        );
        assert_eq!(FaceServiceError::Timeout("15s".into()).marker(), "timeout");
        assert_eq!(
            FaceServiceError::Other("HTTP 500".into()).marker(),
            "HTTP 500"
        );
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::FetchStatus {
            url: "https://r2.example/a.jpg".into(),
            status: 403,
        };
        assert_eq!(
            err.to_string(),
            "Download failed for https://r2.example/a.jpg: HTTP 403"
        );
    }
}
