//! Environment variable overrides.
//!
//! The worker is deployed next to Redis, CompreFace and object storage and
//! receives their coordinates through the environment. Every variable here
//! overrides the matching file/default value when set and non-empty.

use std::str::FromStr;

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub(crate) fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("REDIS_HOST") {
            self.queue.host = v;
        }
        if let Some(v) = get("REDIS_PORT") {
            self.queue.port = parse("REDIS_PORT", &v)?;
        }
        if let Some(v) = get("REDIS_PASSWORD") {
            self.queue.password = v;
        }
        if let Some(v) = get("REDIS_DB") {
            self.queue.db = parse("REDIS_DB", &v)?;
        }

        if let Some(v) = get("COMPREFACE_URL") {
            self.face.endpoint = v;
        }
        if let Some(v) = get("COMPREFACE_API_KEY") {
            self.face.api_key = v;
        }
        if let Some(v) = get("FACE_CASCADE_MODEL") {
            self.face.cascade_model = v;
        }
        if let Some(v) = get("NSFW_MODEL_PATH") {
            self.nsfw.model_path = v;
        }

        if let Some(v) = get("S3_ENDPOINT") {
            self.storage.endpoint = v;
        }
        if let Some(v) = get("S3_ACCESS_KEY") {
            self.storage.access_key = v;
        }
        if let Some(v) = get("S3_SECRET_KEY") {
            self.storage.secret_key = v;
        }
        if let Some(v) = get("S3_BUCKET_PHOTOS") {
            self.storage.bucket = v;
        }

        if let Some(v) = get("BLUR_THRESHOLD") {
            self.policy.blur_threshold = parse("BLUR_THRESHOLD", &v)?;
        }
        if let Some(v) = get("MODERATION_MIN_AGE") {
            self.policy.min_age = parse("MODERATION_MIN_AGE", &v)?;
        }
        if let Some(v) = get("NSFW_PORN_THRESHOLD") {
            self.policy.nsfw_porn = parse("NSFW_PORN_THRESHOLD", &v)?;
        }
        if let Some(v) = get("NSFW_SEXY_THRESHOLD") {
            self.policy.nsfw_sexy = parse("NSFW_SEXY_THRESHOLD", &v)?;
        }
        if let Some(v) = get("NSFW_HENTAI_THRESHOLD") {
            self.policy.nsfw_hentai = parse("NSFW_HENTAI_THRESHOLD", &v)?;
        }
        if let Some(v) = get("NSFW_ANY_THRESHOLD") {
            self.policy.nsfw_safety_net = parse("NSFW_ANY_THRESHOLD", &v)?;
        }

        Ok(())
    }
}

fn parse<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::EnvError {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_queue_and_face() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("REDIS_HOST", "10.0.0.5"),
                ("REDIS_PORT", "6380"),
                ("REDIS_DB", "3"),
                ("COMPREFACE_URL", "http://faces:8000"),
            ]))
            .unwrap();

        assert_eq!(config.queue.host, "10.0.0.5");
        assert_eq!(config.queue.port, 6380);
        assert_eq!(config.queue.db, 3);
        assert_eq!(config.face.endpoint, "http://faces:8000");
    }

    #[test]
    fn test_env_overrides_thresholds() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("BLUR_THRESHOLD", "90"),
                ("NSFW_ANY_THRESHOLD", "0.15"),
                ("MODERATION_MIN_AGE", "18"),
            ]))
            .unwrap();

        assert_eq!(config.policy.blur_threshold, 90.0);
        assert_eq!(config.policy.nsfw_safety_net, 0.15);
        assert_eq!(config.policy.min_age, 18.0);
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[("REDIS_PASSWORD", ""), ("REDIS_HOST", "  ")]))
            .unwrap();
        assert_eq!(config.queue.password, "");
        assert_eq!(config.queue.host, "redis");
    }

    #[test]
    fn test_unparseable_env_value_is_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup(&[("REDIS_PORT", "sixty")]))
            .unwrap_err();
        assert!(err.to_string().contains("REDIS_PORT"));
    }
}
