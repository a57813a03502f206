//! Face presence and age estimation.
//!
//! Two providers share one contract: the network detection service (primary)
//! and a local cascade (fallback). [`FaceResolver`] runs the primary and only
//! consults the fallback when the primary reports an error, recording which
//! detector produced the signal.

pub mod cascade;
pub mod envelope;
pub mod remote;

use async_trait::async_trait;

use super::Photo;
use crate::error::FaceServiceError;
use crate::types::{FaceSignal, FaceSource};

pub use cascade::CascadeDetector;
pub use remote::CompreFaceDetector;

/// Common interface of face detectors.
///
/// Uses `async_trait` so providers can live behind `Box<dyn FaceSignalProvider>`.
#[async_trait]
pub trait FaceSignalProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Detect faces in a photo.
    async fn detect(&self, photo: &Photo) -> Result<FaceSignal, FaceServiceError>;
}

/// Face signal together with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFace {
    pub signal: FaceSignal,
    pub source: FaceSource,
    /// Marker of the primary's error, set whenever the fallback ran
    pub primary_error: Option<String>,
}

/// Primary detector with a fallback on error.
pub struct FaceResolver {
    primary: Box<dyn FaceSignalProvider>,
    fallback: Box<dyn FaceSignalProvider>,
}

impl FaceResolver {
    pub fn new(
        primary: Box<dyn FaceSignalProvider>,
        fallback: Box<dyn FaceSignalProvider>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Resolve the face signal for a photo. Never fails: an unusable fallback
    /// yields "no face".
    pub async fn resolve(&self, photo: &Photo) -> ResolvedFace {
        let primary_err = match self.primary.detect(photo).await {
            Ok(signal) => {
                return ResolvedFace {
                    signal,
                    source: FaceSource::Primary,
                    primary_error: None,
                }
            }
            Err(e) => e,
        };

        tracing::warn!(
            media_id = %photo.media_id,
            provider = self.primary.name(),
            error = %primary_err.marker(),
            detail = primary_err.detail(),
            "Primary face detection failed, using fallback"
        );

        let signal = match self.fallback.detect(photo).await {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(
                    media_id = %photo.media_id,
                    provider = self.fallback.name(),
                    error = %e.detail(),
                    "Fallback face detection unavailable, assuming no face"
                );
                FaceSignal::none()
            }
        };

        ResolvedFace {
            signal,
            source: FaceSource::Fallback,
            primary_error: Some(primary_err.marker()),
        }
    }
}
