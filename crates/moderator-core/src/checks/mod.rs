//! Per-photo signal checks: sharpness, face presence/age, explicit content.
//!
//! Every check reads a [`Photo`] (raw bytes plus the image decoded once by the
//! processor) and reports a [`SignalOutcome`](crate::signal::SignalOutcome)
//! or a classified error, never a silently substituted default.

pub mod face;
pub mod nsfw;
pub mod sharpness;

use std::sync::Arc;

use image::DynamicImage;

pub use face::{FaceResolver, FaceSignalProvider, ResolvedFace};
pub use nsfw::NsfwClassifier;
pub use sharpness::{Sharpness, SharpnessCheck};

/// A downloaded photo, decoded at most once.
#[derive(Debug)]
pub struct Photo {
    pub media_id: String,
    /// Raw bytes as downloaded
    pub bytes: Vec<u8>,
    /// Decoded image, or the decode error message
    pub image: Result<Arc<DynamicImage>, String>,
}

impl Photo {
    pub fn new(
        media_id: impl Into<String>,
        bytes: Vec<u8>,
        image: Result<Arc<DynamicImage>, String>,
    ) -> Self {
        Self {
            media_id: media_id.into(),
            bytes,
            image,
        }
    }

    /// Wrap an already decoded image (used by tests and local checks).
    pub fn from_image(media_id: impl Into<String>, image: DynamicImage) -> Self {
        Self::new(media_id, Vec::new(), Ok(Arc::new(image)))
    }

    /// Shared handle to the decoded image for blocking tasks.
    pub fn decoded(&self) -> Result<Arc<DynamicImage>, String> {
        self.image.clone()
    }
}
