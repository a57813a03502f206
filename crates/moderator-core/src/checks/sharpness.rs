//! Blur detection via variance of the Laplacian.
//!
//! The luminance channel is convolved with the 4-neighbour discrete
//! Laplacian; a sharp image has strong second derivatives at edges and
//! therefore a high response variance.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::filter::filter3x3;

use crate::signal::SignalOutcome;

/// 3×3 discrete Laplacian kernel.
const LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

/// Result of the sharpness check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpness {
    pub variance: f64,
    pub is_blurry: bool,
}

impl Sharpness {
    /// The fail-closed value: zero variance, blurry.
    pub fn failed() -> Self {
        Self {
            variance: 0.0,
            is_blurry: true,
        }
    }
}

/// Stateless blur check with a fixed threshold.
#[derive(Debug, Clone, Copy)]
pub struct SharpnessCheck {
    threshold: f64,
}

impl SharpnessCheck {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Measure a decoded image.
    pub fn measure(&self, image: &DynamicImage) -> SignalOutcome<Sharpness> {
        let gray = image.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return SignalOutcome::degraded(Sharpness::failed(), "empty image");
        }

        let variance = laplacian_variance(&gray);
        if !variance.is_finite() {
            return SignalOutcome::degraded(Sharpness::failed(), "non-finite Laplacian variance");
        }

        SignalOutcome::Ok(Sharpness {
            variance,
            is_blurry: variance < self.threshold,
        })
    }

    /// Outcome for an image that could not be decoded.
    pub fn undecodable(cause: impl Into<String>) -> SignalOutcome<Sharpness> {
        SignalOutcome::degraded(Sharpness::failed(), cause)
    }
}

/// Population variance of the Laplacian response over the whole image.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let response: ImageBuffer<Luma<f32>, Vec<f32>> = filter3x3(gray, &LAPLACIAN);
    let values = response.as_raw();
    if values.is_empty() {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}
