//! Face detection service client (CompreFace-compatible HTTP API).
//!
//! The image is posted as multipart field `file`. Several endpoint paths are
//! probed in order because deployments expose detection under different
//! routes; any non-success answer or transport failure moves on to the next
//! path.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::envelope::parse_response;
use super::FaceSignalProvider;
use crate::checks::Photo;
use crate::config::FaceConfig;
use crate::error::FaceServiceError;
use crate::types::FaceSignal;

/// Client for the face detection service.
pub struct CompreFaceDetector {
    endpoint: String,
    api_key: Option<String>,
    plugins: Option<String>,
    paths: Vec<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl CompreFaceDetector {
    pub fn new(config: &FaceConfig, timeout: Duration) -> Self {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: non_empty(&config.api_key),
            plugins: non_empty(&config.plugins),
            paths: config.detection_paths.clone(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, url: &str, photo: &Photo) -> Result<FaceSignal, FaceServiceError> {
        let part = Part::bytes(photo.bytes.clone())
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| FaceServiceError::Other(e.to_string()))?;
        let form = Form::new().part("file", part);

        let mut request = self.client.post(url).multipart(form).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        if let Some(plugins) = &self.plugins {
            request = request.query(&[("face_plugins", plugins.as_str())]);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FaceServiceError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FaceServiceError::Other(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            )));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                FaceServiceError::from_reqwest(&e)
            } else {
                FaceServiceError::MalformedResponse(e.to_string())
            }
        })?;
        parse_response(&body)
    }
}

#[async_trait]
impl FaceSignalProvider for CompreFaceDetector {
    fn name(&self) -> &str {
        "compreface"
    }

    async fn detect(&self, photo: &Photo) -> Result<FaceSignal, FaceServiceError> {
        let mut last_error =
            FaceServiceError::Other("no face detection paths configured".to_string());

        for path in &self.paths {
            let url = format!("{}{}", self.endpoint, path);
            tracing::debug!(media_id = %photo.media_id, %url, "Trying face detection endpoint");

            match self.post(&url, photo).await {
                Ok(signal) => {
                    tracing::debug!(
                        media_id = %photo.media_id,
                        faces = signal.face_count,
                        age = ?signal.estimated_age,
                        "Face detection result"
                    );
                    return Ok(signal);
                }
                // 2xx ends probing
                Err(e @ FaceServiceError::MalformedResponse(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(%url, error = e.detail(), "Face detection endpoint failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
