//! Moderation pipeline.
//!
//! - **fetch**: download photo bytes
//! - **decode**: decode once, with format sniffing and limits
//! - **processor**: run the checks on one photo and apply the policy
//! - **batch**: sequence photos of a batch and build the outbound record

pub mod batch;
pub mod decode;
pub mod fetch;
pub mod processor;

pub use batch::BatchOrchestrator;
pub use decode::{DecodedImage, ImageDecoder};
pub use fetch::{HttpFetcher, ImageFetcher};
pub use processor::PhotoProcessor;
