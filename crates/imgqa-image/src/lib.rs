#![deny(missing_docs)]
//! Image container types for the imgqa quality metrics

/// image representation used by the quality metrics.
pub mod image;

/// Error types for the image module.
pub mod error;

pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize};
