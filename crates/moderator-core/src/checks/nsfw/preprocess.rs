//! Image preprocessing for the explicit-content classifier.
//!
//! ViT-style image classifiers expect:
//! - a square RGB input (224×224 by default)
//! - per-channel normalization `(pixel/255 - mean) / std`
//! - NCHW layout [batch, channels, height, width]

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

use crate::config::NsfwConfig;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Normalization parameters for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl From<&NsfwConfig> for Normalization {
    fn from(config: &NsfwConfig) -> Self {
        Self {
            size: config.input_size,
            mean: config.mean,
            std: config.std,
        }
    }
}

/// Resize, convert to RGB and normalize into a `[1, 3, size, size]` tensor.
pub fn preprocess(image: &DynamicImage, norm: &Normalization) -> Array4<f32> {
    let rgb = image
        .resize_exact(norm.size, norm.size, FilterType::Triangle)
        .to_rgb8();
    let size = norm.size as usize;

    Array4::from_shape_fn((1, CHANNELS, size, size), |(_, c, y, x)| {
        let value = rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
        (value - norm.mean[c]) / norm.std[c]
    })
}
