//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.poll_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "queue.poll_timeout_secs must be > 0 (0 blocks forever)".into(),
            ));
        }
        if self.queue.queue_name.is_empty() || self.queue.results_channel.is_empty() {
            return Err(ConfigError::ValidationError(
                "queue.queue_name and queue.results_channel must not be empty".into(),
            ));
        }
        if self.face.detection_paths.is_empty() {
            return Err(ConfigError::ValidationError(
                "face.detection_paths must list at least one path".into(),
            ));
        }
        if !(self.face.pyramid_scale_factor > 0.0 && self.face.pyramid_scale_factor < 1.0) {
            return Err(ConfigError::ValidationError(
                "face.pyramid_scale_factor must be between 0.0 and 1.0 (exclusive)".into(),
            ));
        }
        if self.face.slide_step == 0 {
            return Err(ConfigError::ValidationError(
                "face.slide_step must be > 0".into(),
            ));
        }
        if self.nsfw.input_size == 0 {
            return Err(ConfigError::ValidationError(
                "nsfw.input_size must be > 0".into(),
            ));
        }
        if self.nsfw.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ConfigError::ValidationError(
                "nsfw.std values must be finite and > 0".into(),
            ));
        }
        if self.nsfw.mean.iter().any(|m| !m.is_finite()) {
            return Err(ConfigError::ValidationError(
                "nsfw.mean values must be finite".into(),
            ));
        }
        if !self.face.score_threshold.is_finite() {
            return Err(ConfigError::ValidationError(
                "face.score_threshold must be finite".into(),
            ));
        }
        // NaN compares false everywhere, which would disable the rule
        if !self.policy.blur_threshold.is_finite() || self.policy.blur_threshold < 0.0 {
            return Err(ConfigError::ValidationError(
                "policy.blur_threshold must be finite and >= 0".into(),
            ));
        }
        if !self.policy.min_age.is_finite() || self.policy.min_age < 0.0 {
            return Err(ConfigError::ValidationError(
                "policy.min_age must be finite and >= 0".into(),
            ));
        }
        let thresholds = [
            ("policy.nsfw_porn", self.policy.nsfw_porn),
            ("policy.nsfw_sexy", self.policy.nsfw_sexy),
            ("policy.nsfw_hentai", self.policy.nsfw_hentai),
            ("policy.nsfw_safety_net", self.policy.nsfw_safety_net),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 1.0"
                )));
            }
        }
        if self.processing.max_concurrent_photos == 0 {
            return Err(ConfigError::ValidationError(
                "processing.max_concurrent_photos must be > 0".into(),
            ));
        }
        if self.limits.network_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.network_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.max_download_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_download_mb must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_poll_timeout() {
        let mut config = Config::default();
        config.queue.poll_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_timeout_secs"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.policy.nsfw_sexy = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("nsfw_sexy"));

        config.policy.nsfw_sexy = 0.4;
        config.policy.nsfw_safety_net = -0.1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("nsfw_safety_net"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.network_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("network_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.processing.max_concurrent_photos = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_photos"));
    }

    #[test]
    fn test_validate_rejects_non_finite_policy_values() {
        let mut config = Config::default();
        config.policy.blur_threshold = f64::NAN;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("blur_threshold"));

        config.policy.blur_threshold = f64::INFINITY;
        assert!(config.validate().is_err());

        config.policy.blur_threshold = 120.0;
        config.policy.min_age = f32::NAN;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_age"));

        config.policy.min_age = f32::INFINITY;
        assert!(config.validate().is_err());

        config.policy.min_age = 10.0;
        config.policy.nsfw_porn = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_env_overrides_fail_validation() {
        let mut config = Config::default();
        config
            .apply_overrides(|var| match var {
                "BLUR_THRESHOLD" => Some("NaN".to_string()),
                "MODERATION_MIN_AGE" => Some("nan".to_string()),
                _ => None,
            })
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_pyramid_factor() {
        let mut config = Config::default();
        config.face.pyramid_scale_factor = 1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pyramid_scale_factor"));
    }
}
