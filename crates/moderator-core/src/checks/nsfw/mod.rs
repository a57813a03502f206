//! Explicit-content classification.
//!
//! The classifier is loaded once at startup and shared read-only. When the
//! model is absent every photo gets all-zero scores, which the decision policy
//! turns into `nsfw_check_failed`.
//!
//! Two output layouts are understood:
//!
//! | classes | mapping |
//! |---|---|
//! | 5: drawings, hentai, neutral, porn, sexy | porn = p\[3\], sexy = p\[4\], hentai = p\[1\] |
//! | 2: normal, nsfw | porn = 0.5·n, sexy = 0.3·n, hentai = 0.2·n |

pub(crate) mod preprocess;
pub(crate) mod session;

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;

use crate::config::NsfwConfig;
use crate::error::PipelineResult;
use crate::signal::SignalOutcome;
use crate::types::NsfwScores;

pub use self::preprocess::Normalization;
pub use self::session::OnnxClassifier;

/// A model producing class probabilities for an image.
pub trait ProbabilityModel: Send + Sync {
    fn probabilities(&self, image: &DynamicImage) -> PipelineResult<Vec<f32>>;
}

/// Explicit-content classifier over an optional model.
#[derive(Clone)]
pub struct NsfwClassifier {
    model: Option<Arc<dyn ProbabilityModel>>,
}

impl NsfwClassifier {
    /// Load the ONNX model. A load failure degrades to an absent model.
    pub fn load(model_path: &Path, config: &NsfwConfig) -> Self {
        match OnnxClassifier::load(model_path, Normalization::from(config)) {
            Ok(model) => {
                tracing::info!(path = %model_path.display(), "Loaded NSFW classifier");
                Self::with_model(Arc::new(model))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "NSFW classifier unavailable; every photo will be rejected as nsfw_check_failed"
                );
                Self::absent()
            }
        }
    }

    pub fn with_model(model: Arc<dyn ProbabilityModel>) -> Self {
        Self { model: Some(model) }
    }

    pub fn absent() -> Self {
        Self { model: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Score a decoded image. CPU-bound: call from a blocking task.
    pub fn classify(&self, image: &DynamicImage) -> SignalOutcome<NsfwScores> {
        let Some(model) = &self.model else {
            return SignalOutcome::unavailable("model not loaded");
        };

        match model.probabilities(image) {
            Ok(probs) => match interpret(&probs) {
                Some(scores) => SignalOutcome::Ok(scores),
                None => SignalOutcome::degraded(
                    NsfwScores::default(),
                    format!("unexpected class count {}", probs.len()),
                ),
            },
            Err(e) => SignalOutcome::degraded(NsfwScores::default(), e.to_string()),
        }
    }
}

/// Map class probabilities onto porn/sexy/hentai.
pub fn interpret(probs: &[f32]) -> Option<NsfwScores> {
    match *probs {
        [_drawings, hentai, _neutral, porn, sexy] => Some(NsfwScores::new(porn, sexy, hentai)),
        [_normal, nsfw] => Some(NsfwScores::new(0.5 * nsfw, 0.3 * nsfw, 0.2 * nsfw)),
        _ => None,
    }
}
