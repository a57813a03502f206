//! Image download from object storage.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};

/// Source of photo bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> PipelineResult<Vec<u8>>;
}

/// Downloads photos over HTTP(S) with a timeout and a size limit.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(limits.network_timeout_ms),
            max_bytes: limits.max_download_mb * 1024 * 1024,
        }
    }

    fn too_large(&self, url: &str, size: u64) -> PipelineError {
        PipelineError::FileTooLarge {
            url: url.to_string(),
            size_mb: size / (1024 * 1024),
            max_mb: self.max_bytes / (1024 * 1024),
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> PipelineResult<Vec<u8>> {
        let fetch_err = |e: reqwest::Error| PipelineError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(fetch_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(size) = response.content_length() {
            if size > self.max_bytes {
                return Err(self.too_large(url, size));
            }
        }

        let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(fetch_err)?;
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_bytes {
                return Err(self.too_large(url, bytes.len() as u64));
            }
        }

        tracing::trace!(%url, bytes = bytes.len(), "Downloaded photo");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&LimitsConfig::default());
        let bytes = fetcher
            .fetch(&format!("{}/photos/a.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&LimitsConfig::default());
        let err = fetcher
            .fetch(&format!("{}/missing.jpg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::FetchStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_size_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2 * 1024 * 1024]))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&LimitsConfig {
            max_download_mb: 1,
            ..LimitsConfig::default()
        });
        let err = fetcher
            .fetch(&format!("{}/big.jpg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::FileTooLarge { max_mb: 1, .. }));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let fetcher = HttpFetcher::new(&LimitsConfig::default());
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }
}
