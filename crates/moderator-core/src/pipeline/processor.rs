//! Per-photo processing: fetch → decode → checks → decision.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;

use crate::checks::face::{CascadeDetector, CompreFaceDetector, FaceResolver, ResolvedFace};
use crate::checks::{NsfwClassifier, Photo, Sharpness, SharpnessCheck};
use crate::config::Config;
use crate::policy::DecisionPolicy;
use crate::signal::SignalOutcome;
use crate::types::{NsfwScores, PhotoJob, PhotoResult, SignalSet};

use super::decode::ImageDecoder;
use super::fetch::{HttpFetcher, ImageFetcher};

/// Runs every check on one photo and applies the decision policy.
pub struct PhotoProcessor {
    fetcher: Arc<dyn ImageFetcher>,
    decoder: ImageDecoder,
    sharpness: SharpnessCheck,
    faces: FaceResolver,
    nsfw: NsfwClassifier,
    policy: DecisionPolicy,
}

impl PhotoProcessor {
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn ImageFetcher>,
        faces: FaceResolver,
        nsfw: NsfwClassifier,
    ) -> Self {
        let policy = DecisionPolicy::new(config.policy.clone());
        Self {
            fetcher,
            decoder: ImageDecoder::new(config.limits.clone()),
            sharpness: SharpnessCheck::new(policy.blur_threshold()),
            faces,
            nsfw,
            policy,
        }
    }

    /// Build the production collaborators from configuration.
    ///
    /// Model loading happens here, once. Missing models degrade the matching
    /// check instead of failing startup.
    pub fn from_config(config: &Config) -> Self {
        let network_timeout = Duration::from_millis(config.limits.network_timeout_ms);
        let faces = FaceResolver::new(
            Box::new(CompreFaceDetector::new(&config.face, network_timeout)),
            Box::new(CascadeDetector::load(
                &config.cascade_model_path(),
                &config.face,
            )),
        );
        let nsfw = NsfwClassifier::load(&config.nsfw_model_path(), &config.nsfw);
        Self::new(
            config,
            Arc::new(HttpFetcher::new(&config.limits)),
            faces,
            nsfw,
        )
    }

    pub fn nsfw_loaded(&self) -> bool {
        self.nsfw.is_loaded()
    }

    /// Download and moderate one photo. Never fails: a download error becomes
    /// a `failed` result.
    pub async fn process(&self, job: &PhotoJob) -> PhotoResult {
        let start = Instant::now();
        match self.fetcher.fetch(&job.r2_url).await {
            Ok(bytes) => self.evaluate(&job.media_id, bytes, start).await,
            Err(e) => {
                tracing::warn!(media_id = %job.media_id, error = %e, "Photo download failed");
                PhotoResult::failed(&job.media_id, e)
            }
        }
    }

    /// Moderate photo bytes that are already in memory.
    pub async fn process_bytes(&self, media_id: &str, bytes: Vec<u8>) -> PhotoResult {
        self.evaluate(media_id, bytes, Instant::now()).await
    }

    async fn evaluate(&self, media_id: &str, bytes: Vec<u8>, start: Instant) -> PhotoResult {
        let decode_start = Instant::now();
        let image = match self.decoder.decode_from_bytes(bytes.clone(), media_id).await {
            Ok(decoded) => {
                tracing::trace!(
                    media_id,
                    width = decoded.width,
                    height = decoded.height,
                    format = %super::decode::format_to_string(decoded.format),
                    elapsed = ?decode_start.elapsed(),
                    "Decoded"
                );
                Ok(Arc::new(decoded.image))
            }
            Err(e) => {
                tracing::warn!(media_id, error = %e, "Photo could not be decoded");
                Err(e.to_string())
            }
        };
        let photo = Photo::new(media_id, bytes, image);

        let (face, (sharpness, nsfw)) =
            tokio::join!(self.faces.resolve(&photo), self.local_checks(&photo));

        let sharpness = log_outcome(media_id, "sharpness", sharpness).resolve(Sharpness::failed());
        let nsfw = log_outcome(media_id, "nsfw", nsfw).resolve(NsfwScores::default());

        let signals = signal_set(sharpness, face, nsfw, start.elapsed());
        let decision = self.policy.evaluate(&signals);

        tracing::info!(
            media_id,
            status = ?decision.verdict.status(),
            reason = decision.verdict.reason().map(|r| r.as_str()).unwrap_or("-"),
            nsfw_trigger = ?decision.nsfw_trigger,
            blur_variance = signals.blur_variance,
            face_count = signals.face_count,
            estimated_age = ?signals.estimated_age,
            face_source = ?signals.face_source,
            porn = signals.nsfw.porn,
            sexy = signals.nsfw.sexy,
            hentai = signals.nsfw.hentai,
            elapsed_ms = signals.processing_time_ms,
            "Photo moderated"
        );

        PhotoResult::decided(media_id, decision.verdict, signals)
    }

    /// Sharpness and NSFW on the blocking pool.
    async fn local_checks(
        &self,
        photo: &Photo,
    ) -> (SignalOutcome<Sharpness>, SignalOutcome<NsfwScores>) {
        let image: Arc<DynamicImage> = match photo.decoded() {
            Ok(image) => image,
            Err(cause) => {
                return (
                    SharpnessCheck::undecodable(cause.clone()),
                    SignalOutcome::unavailable(cause),
                )
            }
        };

        let sharpness = self.sharpness;
        let nsfw = self.nsfw.clone();
        tokio::task::spawn_blocking(move || (sharpness.measure(&image), nsfw.classify(&image)))
            .await
            .unwrap_or_else(|e| {
                let cause = format!("check task failed: {e}");
                (
                    SharpnessCheck::undecodable(cause.clone()),
                    SignalOutcome::unavailable(cause),
                )
            })
    }
}

fn log_outcome<T>(media_id: &str, check: &str, outcome: SignalOutcome<T>) -> SignalOutcome<T> {
    if let Some(cause) = outcome.cause() {
        tracing::warn!(media_id, check, cause, "Signal degraded, using fail-closed value");
    }
    outcome
}

fn signal_set(
    sharpness: Sharpness,
    face: ResolvedFace,
    nsfw: NsfwScores,
    elapsed: Duration,
) -> SignalSet {
    SignalSet {
        blur_variance: sharpness.variance,
        is_blurry: sharpness.is_blurry,
        has_face: face.signal.has_face,
        face_count: face.signal.face_count,
        estimated_age: face.signal.estimated_age,
        face_source: face.source,
        face_error: face.primary_error,
        nsfw,
        processing_time_ms: elapsed.as_millis() as u64,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::checks::face::testing::FixedProvider;
    use crate::checks::nsfw::ProbabilityModel;
    use crate::error::{FaceServiceError, PipelineError, PipelineResult};
    use crate::pipeline::decode::tests::png_bytes;
    use crate::types::{FaceSignal, FaceSource, PhotoStatus};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Serves canned bytes per URL; unknown URLs 404.
    pub(crate) struct MapFetcher(pub HashMap<String, Vec<u8>>);

    #[async_trait]
    impl ImageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> PipelineResult<Vec<u8>> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| PipelineError::FetchStatus {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    pub(crate) struct FixedModel(pub Vec<f32>);

    impl ProbabilityModel for FixedModel {
        fn probabilities(&self, _image: &DynamicImage) -> PipelineResult<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    pub(crate) const CLEAN: [f32; 5] = [0.02, 0.01, 0.95, 0.01, 0.01];

    pub(crate) fn processor(
        files: &[(&str, Vec<u8>)],
        primary: Result<FaceSignal, FaceServiceError>,
        fallback: Result<FaceSignal, FaceServiceError>,
        nsfw: Option<Vec<f32>>,
    ) -> PhotoProcessor {
        let fetcher = MapFetcher(
            files
                .iter()
                .map(|(url, bytes)| (url.to_string(), bytes.clone()))
                .collect(),
        );
        let faces = FaceResolver::new(FixedProvider::boxed(primary).0, FixedProvider::boxed(fallback).0);
        let nsfw = match nsfw {
            Some(probs) => NsfwClassifier::with_model(Arc::new(FixedModel(probs))),
            None => NsfwClassifier::absent(),
        };
        PhotoProcessor::new(&Config::default(), Arc::new(fetcher), faces, nsfw)
    }

    fn job(url: &str) -> PhotoJob {
        PhotoJob {
            media_id: "m-1".into(),
            r2_url: url.into(),
            r2_key: None,
            bucket: None,
        }
    }

    #[tokio::test]
    async fn test_all_clear_is_approved() {
        let p = processor(
            &[("u1", png_bytes(256, 256))],
            Ok(FaceSignal::faces(1, Some(30.0))),
            Ok(FaceSignal::none()),
            Some(CLEAN.to_vec()),
        );
        let result = p.process(&job("u1")).await;
        assert_eq!(result.status, PhotoStatus::Approved);
        assert_eq!(result.reason, None);
        let scores = result.scores.unwrap();
        assert!(!scores.is_blurry);
        assert_eq!(scores.face_source, FaceSource::Primary);
    }

    #[tokio::test]
    async fn test_download_failure_is_failed() {
        let p = processor(&[], Ok(FaceSignal::faces(1, None)), Ok(FaceSignal::none()), None);
        let result = p.process(&job("missing")).await;
        assert_eq!(result.status, PhotoStatus::Failed);
        assert!(result.reason.unwrap().contains("HTTP 404"));
        assert_eq!(result.scores, None);
    }

    #[tokio::test]
    async fn test_undecodable_bytes_fail_closed_as_blurry() {
        let p = processor(
            &[("u1", b"definitely not an image".to_vec())],
            Ok(FaceSignal::faces(1, Some(30.0))),
            Ok(FaceSignal::none()),
            Some(CLEAN.to_vec()),
        );
        let result = p.process(&job("u1")).await;
        assert_eq!(result.status, PhotoStatus::Rejected);
        assert_eq!(result.reason.as_deref(), Some("blurry"));
        let scores = result.scores.unwrap();
        assert_eq!(scores.blur_variance, 0.0);
        assert!(scores.nsfw.is_all_zero());
    }

    #[tokio::test]
    async fn test_fallback_child_face_is_underage() {
        // Service unreachable; the cascade finds one small face.
        let p = processor(
            &[("u1", png_bytes(256, 256))],
            Err(FaceServiceError::Connection("refused".into())),
            Ok(FaceSignal::faces(1, Some(3.0))),
            Some(CLEAN.to_vec()),
        );
        let result = p.process(&job("u1")).await;
        assert_eq!(result.reason.as_deref(), Some("underage"));
        let scores = result.scores.unwrap();
        assert_eq!(scores.face_source, FaceSource::Fallback);
        assert_eq!(scores.face_error.as_deref(), Some("connection_failed"));
    }

    #[tokio::test]
    async fn test_missing_nsfw_model_is_check_failed() {
        let p = processor(
            &[("u1", png_bytes(256, 256))],
            Ok(FaceSignal::faces(1, Some(30.0))),
            Ok(FaceSignal::none()),
            None,
        );
        let result = p.process(&job("u1")).await;
        assert_eq!(result.reason.as_deref(), Some("nsfw_check_failed"));
    }

    #[tokio::test]
    async fn test_process_bytes_nsfw() {
        let p = processor(
            &[],
            Ok(FaceSignal::faces(1, Some(30.0))),
            Ok(FaceSignal::none()),
            Some(vec![0.05, 0.10, 0.50, 0.30, 0.05]),
        );
        let result = p.process_bytes("local", png_bytes(128, 128)).await;
        assert_eq!(result.media_id, "local");
        assert_eq!(result.reason.as_deref(), Some("nsfw"));
    }
}
