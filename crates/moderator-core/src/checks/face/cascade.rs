//! Local cascade face detector, used when the detection service errors.
//!
//! Raw detections come from a [`CascadeBackend`] (SeetaFace funnel cascade via
//! `rustface` in production). Implausible boxes are discarded and an age is
//! guessed from the size of the largest remaining face. The guess is
//! biased toward young ages: a small face in the frame is read
//! as a child.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use rustface::{ImageData, Model};

use super::FaceSignalProvider;
use crate::checks::Photo;
use crate::config::FaceConfig;
use crate::error::FaceServiceError;
use crate::types::FaceSignal;

/// Smallest face the cascade searches for, in pixels.
const MIN_FACE_PX: u32 = 30;

/// A raw face bounding box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Pluggable raw face detection backend.
pub trait CascadeBackend: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes,
    /// limited to face sizes between `min_size` and `max_size` pixels.
    fn detect(
        &self,
        gray: &[u8],
        width: u32,
        height: u32,
        min_size: u32,
        max_size: u32,
    ) -> Result<Vec<FaceBox>, String>;
}

/// SeetaFace frontal cascade.
pub struct SeetaCascade {
    model: Model,
    score_threshold: f64,
    pyramid_scale_factor: f32,
    slide_step: u32,
}

impl SeetaCascade {
    /// Read and parse the cascade model file.
    pub fn load(path: &Path, config: &FaceConfig) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let model = rustface::read_model(bytes.as_slice())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(Self {
            model,
            score_threshold: config.score_threshold,
            pyramid_scale_factor: config.pyramid_scale_factor,
            slide_step: config.slide_step,
        })
    }
}

impl CascadeBackend for SeetaCascade {
    fn detect(
        &self,
        gray: &[u8],
        width: u32,
        height: u32,
        min_size: u32,
        max_size: u32,
    ) -> Result<Vec<FaceBox>, String> {
        // Detectors are stateful and not shareable; each call gets its own copy
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(min_size);
        detector.set_max_face_size(max_size);
        detector.set_score_thresh(self.score_threshold);
        detector.set_pyramid_scale_factor(self.pyramid_scale_factor);
        detector.set_slide_window_step(self.slide_step, self.slide_step);

        let mut image = ImageData::new(gray, width, height);
        Ok(detector
            .detect(&mut image)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBox {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect())
    }
}

/// Search window for an image: `max(30, 5% of shorter side)` to `90% of shorter side`.
pub fn face_size_bounds(width: u32, height: u32) -> (u32, u32) {
    let shorter = width.min(height) as f64;
    let min = MIN_FACE_PX.max((shorter * 0.05) as u32);
    let max = (shorter * 0.9) as u32;
    (min, max)
}

/// Keep boxes covering 1–60% of the image with a width/height ratio in 0.6–1.5.
pub fn plausible_faces(boxes: &[FaceBox], width: u32, height: u32) -> Vec<FaceBox> {
    let image_area = width as f64 * height as f64;
    if image_area == 0.0 {
        return Vec::new();
    }
    boxes
        .iter()
        .copied()
        .filter(|b| {
            let ratio = b.area() as f64 / image_area;
            (0.01..=0.60).contains(&ratio)
        })
        .filter(|b| {
            b.height > 0 && (0.6..=1.5).contains(&(b.width as f64 / b.height as f64))
        })
        .collect()
}

/// Age guess from the largest face's share of the image.
pub fn estimate_age(face: &FaceBox, width: u32, height: u32) -> f32 {
    let ratio = face.area() as f64 / (width as f64 * height as f64);
    let mut age = if ratio < 0.025 {
        3.0
    } else if ratio < 0.04 {
        6.0
    } else if ratio < 0.06 {
        9.0
    } else if ratio < 0.09 {
        15.0
    } else {
        25.0
    };
    // Small in absolute pixels reads as a child regardless of framing
    if (face.width < 100 || face.height < 100) && age >= 10.0 {
        age = 7.0;
    }
    age
}

/// Face signal from raw detections.
pub fn signal_from_boxes(boxes: &[FaceBox], width: u32, height: u32) -> FaceSignal {
    let faces = plausible_faces(boxes, width, height);
    let age = faces
        .iter()
        .max_by_key(|b| b.area())
        .map(|largest| estimate_age(largest, width, height));
    FaceSignal::faces(faces.len() as u32, age)
}

/// Fallback face detector over the locally decoded image.
pub struct CascadeDetector {
    backend: Option<Arc<dyn CascadeBackend>>,
}

impl CascadeDetector {
    /// Load the cascade model; a missing or invalid model leaves the detector
    /// unavailable (every call reports an error, which resolves to no face).
    pub fn load(path: &Path, config: &FaceConfig) -> Self {
        match SeetaCascade::load(path, config) {
            Ok(cascade) => {
                tracing::info!(path = %path.display(), "Loaded fallback face cascade");
                Self::with_backend(Arc::new(cascade))
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Fallback face cascade unavailable"
                );
                Self { backend: None }
            }
        }
    }

    pub fn with_backend(backend: Arc<dyn CascadeBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn detect_sync(
        backend: &dyn CascadeBackend,
        image: &DynamicImage,
    ) -> Result<FaceSignal, String> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let (min_size, max_size) = face_size_bounds(width, height);
        if max_size < min_size {
            return Ok(FaceSignal::none());
        }

        let boxes = backend.detect(gray.as_raw(), width, height, min_size, max_size)?;
        let signal = signal_from_boxes(&boxes, width, height);
        tracing::debug!(
            candidates = boxes.len(),
            faces = signal.face_count,
            age = ?signal.estimated_age,
            width,
            height,
            "Cascade face detection"
        );
        Ok(signal)
    }
}

#[async_trait]
impl FaceSignalProvider for CascadeDetector {
    fn name(&self) -> &str {
        "cascade"
    }

    async fn detect(&self, photo: &Photo) -> Result<FaceSignal, FaceServiceError> {
        let backend = self
            .backend
            .clone()
            .ok_or_else(|| FaceServiceError::Other("cascade model not loaded".to_string()))?;
        let image = photo.decoded().map_err(FaceServiceError::Other)?;

        tokio::task::spawn_blocking(move || Self::detect_sync(backend.as_ref(), &image))
            .await
            .map_err(|e| FaceServiceError::Other(format!("cascade task failed: {e}")))?
            .map_err(FaceServiceError::Other)
    }
}
