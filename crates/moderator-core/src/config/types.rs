//! Sub-configuration structs with defaults matching the strict moderation profile.

use serde::{Deserialize, Serialize};

/// Work queue and result channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Redis host
    pub host: String,

    /// Redis port
    pub port: u16,

    /// Redis password (empty = no auth)
    pub password: String,

    /// Redis database index
    pub db: i64,

    /// List the worker pops jobs from
    pub queue_name: String,

    /// Pub/sub channel results are published to
    pub results_channel: String,

    /// Bounded wait for a blocking dequeue, in seconds
    pub poll_timeout_secs: u64,

    /// Base backoff after a failed loop iteration, in milliseconds
    pub error_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: "redis".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
            queue_name: "photo_moderation_queue".to_string(),
            results_channel: "moderation_results".to_string(),
            poll_timeout_secs: 5,
            error_backoff_ms: 1000,
        }
    }
}

impl QueueConfig {
    /// Connection settings for the Redis client. The password is passed
    /// through verbatim, whatever characters it contains.
    pub fn connection_info(&self) -> redis::ConnectionInfo {
        redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: redis::RedisConnectionInfo {
                db: self.db,
                password: (!self.password.is_empty()).then(|| self.password.clone()),
                ..Default::default()
            },
        }
    }
}

/// Face detection settings (primary service and fallback cascade).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Base URL of the detection service
    pub endpoint: String,

    /// API key sent as `x-api-key` (empty = none)
    pub api_key: String,

    /// Value of the `face_plugins` query parameter (empty = omit)
    pub plugins: String,

    /// Detection paths tried in order until one answers
    pub detection_paths: Vec<String>,

    /// Path to the SeetaFace cascade model used by the fallback detector
    pub cascade_model: String,

    /// Cascade classification score threshold
    pub score_threshold: f64,

    /// Image pyramid scale factor (0 < f < 1)
    pub pyramid_scale_factor: f32,

    /// Sliding window step in pixels
    pub slide_step: u32,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://compreface:8000".to_string(),
            api_key: String::new(),
            plugins: "age".to_string(),
            detection_paths: vec![
                "/api/v1/detection/detect".to_string(),
                "/api/v1/recognition/recognize".to_string(),
                "/api/v1/detection".to_string(),
            ],
            cascade_model: "~/.moderator/models/seeta_fd_frontal_v1.0.bin".to_string(),
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            slide_step: 4,
        }
    }
}

/// Explicit-content classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NsfwConfig {
    /// Path to the ONNX classifier
    pub model_path: String,

    /// Square input size expected by the model
    pub input_size: u32,

    /// Per-channel normalization mean
    pub mean: [f32; 3],

    /// Per-channel normalization std
    pub std: [f32; 3],
}

impl Default for NsfwConfig {
    fn default() -> Self {
        Self {
            model_path: "~/.moderator/models/nsfw_image_detection.onnx".to_string(),
            input_size: 224,
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }
}

/// Decision policy thresholds.
///
/// Defaults are the strict profile: age under 10 and a 0.20 NSFW safety net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Laplacian variance below which a photo is blurry
    pub blur_threshold: f64,

    /// Estimated ages strictly below this are rejected as underage
    pub min_age: f32,

    /// Porn probability threshold
    pub nsfw_porn: f32,

    /// Sexy probability threshold
    pub nsfw_sexy: f32,

    /// Hentai probability threshold
    pub nsfw_hentai: f32,

    /// Coarse threshold applied to every NSFW category
    pub nsfw_safety_net: f32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            blur_threshold: 120.0,
            min_age: 10.0,
            nsfw_porn: 0.25,
            nsfw_sexy: 0.40,
            nsfw_hentai: 0.30,
            nsfw_safety_net: 0.20,
        }
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Delay inserted between photos to smooth load on the face service
    pub photo_delay_ms: u64,

    /// Photos evaluated at once within a batch (1 = sequential)
    pub max_concurrent_photos: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            photo_delay_ms: 100,
            max_concurrent_photos: 1,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Timeout for every outbound network call (download, face detection)
    pub network_timeout_ms: u64,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Maximum downloaded image size in megabytes
    pub max_download_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            network_timeout_ms: 15000,
            decode_timeout_ms: 5000,
            max_image_dimension: 10000,
            max_download_mb: 25,
        }
    }
}

/// Object storage settings, used only by the image download collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// S3-compatible endpoint
    pub endpoint: String,

    /// Access key
    pub access_key: String,

    /// Secret key
    pub secret_key: String,

    /// Bucket holding user photos
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: "lomi-photos".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_info_without_password() {
        let info = QueueConfig::default().connection_info();
        assert_eq!(
            info.addr,
            redis::ConnectionAddr::Tcp("redis".to_string(), 6379)
        );
        assert_eq!(info.redis.db, 0);
        assert_eq!(info.redis.password, None);
    }

    #[test]
    fn test_connection_info_keeps_reserved_characters_in_password() {
        let config = QueueConfig {
            password: "p@ss/w#rd:%?".to_string(),
            db: 2,
            ..QueueConfig::default()
        };
        let info = config.connection_info();
        assert_eq!(info.redis.password.as_deref(), Some("p@ss/w#rd:%?"));
        assert_eq!(info.redis.db, 2);
        assert_eq!(
            info.addr,
            redis::ConnectionAddr::Tcp("redis".to_string(), 6379)
        );
        assert!(redis::Client::open(info).is_ok());
    }

    #[test]
    fn test_policy_defaults_are_strict_profile() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.blur_threshold, 120.0);
        assert_eq!(policy.min_age, 10.0);
        assert_eq!(policy.nsfw_safety_net, 0.20);
    }
}
