//! Image decoding with format detection, validation, and timeout support.

use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, GenericImageView, ImageFormat};
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};

/// Image decoder with configurable limits and timeout.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode downloaded bytes with validation and timeout.
    ///
    /// Decoding runs on the blocking pool; the format is sniffed from the
    /// content, never from the URL.
    pub async fn decode_from_bytes(
        &self,
        bytes: Vec<u8>,
        media_id: &str,
    ) -> PipelineResult<DecodedImage> {
        let id = media_id.to_string();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || Self::decode_bytes_sync(bytes, &id)).await
        })
        .await;

        match decode_result {
            Ok(Ok(Ok(decoded))) => {
                if decoded.width > self.limits.max_image_dimension
                    || decoded.height > self.limits.max_image_dimension
                {
                    return Err(PipelineError::ImageTooLarge {
                        media_id: media_id.to_string(),
                        width: decoded.width,
                        height: decoded.height,
                        max_dim: self.limits.max_image_dimension,
                    });
                }
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(PipelineError::Decode {
                media_id: media_id.to_string(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                media_id: media_id.to_string(),
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    /// Synchronous decode from bytes (runs in spawn_blocking).
    fn decode_bytes_sync(bytes: Vec<u8>, media_id: &str) -> PipelineResult<DecodedImage> {
        let decode_err = |message: String| PipelineError::Decode {
            media_id: media_id.to_string(),
            message,
        };

        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| decode_err(format!("Cannot detect image format: {}", e)))?;
        let format = reader
            .format()
            .ok_or_else(|| decode_err("Unrecognized image format".to_string()))?;
        let image = reader.decode().map_err(|e| decode_err(e.to_string()))?;

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
        })
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Encode a generated image as PNG bytes.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn decoder() -> ImageDecoder {
        ImageDecoder::new(LimitsConfig::default())
    }

    #[test]
    fn test_format_to_string() {
        assert_eq!(format_to_string(ImageFormat::Jpeg), "jpeg");
        assert_eq!(format_to_string(ImageFormat::Png), "png");
        assert_eq!(format_to_string(ImageFormat::WebP), "webp");
    }

    #[tokio::test]
    async fn test_decode_png_bytes() {
        let decoded = decoder()
            .decode_from_bytes(png_bytes(40, 30), "m-1")
            .await
            .unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!((decoded.width, decoded.height), (40, 30));
    }

    #[tokio::test]
    async fn test_garbage_bytes_fail_to_decode() {
        let err = decoder()
            .decode_from_bytes(b"<html>not an image</html>".to_vec(), "m-2")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { ref media_id, .. } if media_id == "m-2"));
    }

    #[tokio::test]
    async fn test_oversized_dimensions_rejected() {
        let decoder = ImageDecoder::new(LimitsConfig {
            max_image_dimension: 32,
            ..LimitsConfig::default()
        });
        let err = decoder
            .decode_from_bytes(png_bytes(64, 16), "m-3")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ImageTooLarge { width: 64, .. }));
    }
}
