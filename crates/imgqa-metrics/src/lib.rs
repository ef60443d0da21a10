#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// block-svd structural quality module.
pub mod blocksvd;

/// decomposition of images into channel planes.
pub mod channels;

/// error types for the quality metrics.
pub mod error;

/// image filtering primitives.
pub mod filter;

/// generalized gaussian fitting.
pub mod fit;

/// gm-log no-reference quality module.
pub mod gmlog;

/// range normalization of feature vectors.
pub mod ranges;

/// per-channel result scalar.
pub mod scalar;

/// support vector regression scorer.
pub mod svm;

pub use crate::blocksvd::QualityBlockSvd;
pub use crate::error::QualityError;
pub use crate::gmlog::QualityGmlog;
pub use crate::ranges::RangeTable;
pub use crate::scalar::Scalar;
pub use crate::svm::SvrModel;

use imgqa_image::Image;

/// Capability shared by the quality metrics: score an image and identify the
/// algorithm.
///
/// Both [`QualityGmlog`] and [`QualityBlockSvd`] implement this, so callers
/// that treat the algorithms uniformly (a metric registry, a benchmark
/// harness) can dispatch through it.
pub trait QualityMetric<T, const C: usize> {
    /// Compute per-channel quality scores for an image.
    fn compute(&mut self, img: &Image<T, C>) -> Result<Scalar, QualityError>;

    /// Stable identifier of the algorithm.
    fn default_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgqa_image::ImageSize;

    #[test]
    fn metrics_dispatch_uniformly() -> Result<(), QualityError> {
        let img = Image::<f32, 1>::from_size_val(
            ImageSize {
                width: 32,
                height: 32,
            },
            64.0,
        )?;

        let mut blocksvd = QualityBlockSvd::with_reference(&img, (8, 8))?;
        let metric: &mut dyn QualityMetric<f32, 1> = &mut blocksvd;

        assert_eq!(metric.default_name(), "quality-blocksvd");
        let score = metric.compute(&img)?;
        assert_eq!(score[0], 0.0);

        Ok(())
    }
}
