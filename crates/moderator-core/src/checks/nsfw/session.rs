//! ONNX Runtime session for the explicit-content classifier.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;

use super::preprocess::{preprocess, Normalization};
use super::ProbabilityModel;
use crate::error::{PipelineError, PipelineResult};

/// Wraps an ONNX Runtime session producing class logits.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
    norm: Normalization,
}

impl OnnxClassifier {
    /// Load a classifier from an ONNX file.
    pub fn load(model_path: &Path, norm: Normalization) -> PipelineResult<Self> {
        let load_err = |message: String| PipelineError::ModelLoad {
            path: model_path.display().to_string(),
            message,
        };

        if !model_path.exists() {
            return Err(load_err("model file not found".to_string()));
        }

        let session = Session::builder()
            .map_err(|e| load_err(format!("Failed to create ONNX session builder: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| load_err(format!("Failed to load ONNX model: {e}")))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        tracing::debug!(
            "Loaded NSFW classifier from {:?} (input: {:?}, outputs: {:?})",
            model_path,
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            norm,
        })
    }

    fn logits(&self, image: &DynamicImage) -> PipelineResult<Vec<f32>> {
        let tensor = preprocess(image, &self.norm);
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let flat: Vec<f32> = tensor.iter().copied().collect();

        let input = Value::from_array((shape, flat)).map_err(|e| PipelineError::Inference {
            message: format!("Failed to create input tensor: {e}"),
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input];

        let mut session = self.session.lock().map_err(|e| PipelineError::Inference {
            message: format!("Session lock poisoned: {e}"),
        })?;
        let outputs = session.run(inputs).map_err(|e| PipelineError::Inference {
            message: format!("ONNX inference failed: {e}"),
        })?;

        // Classifiers export a single `logits` output; take the first otherwise.
        let (_, output) = outputs
            .iter()
            .find(|(name, _)| *name == "logits")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| PipelineError::Inference {
                message: "Model produced no outputs".to_string(),
            })?;

        let (shape, data) =
            output
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Inference {
                    message: format!("Failed to extract logits tensor: {e}"),
                })?;

        // [num_classes] or [1, num_classes]
        match shape.len() {
            1 => Ok(data.to_vec()),
            2 => Ok(data[..shape[1] as usize].to_vec()),
            _ => Err(PipelineError::Inference {
                message: format!("Unexpected logits shape: {:?}", shape),
            }),
        }
    }
}

impl ProbabilityModel for OnnxClassifier {
    fn probabilities(&self, image: &DynamicImage) -> PipelineResult<Vec<f32>> {
        Ok(softmax(&self.logits(image)?))
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}
