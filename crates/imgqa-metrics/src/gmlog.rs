//! GM-LOG no-reference image quality.
//!
//! The metric derives Natural Scene Statistics features from
//! gradient-magnitude and Laplacian-of-Gaussian response maps and maps them
//! through a pre-trained support vector regression to a quality score.
//! Scores range from 0 (best quality) to 100 (worst quality) for models
//! trained on that scale; extreme distortions may exceed 100 and the value is
//! deliberately not clamped.

use std::path::Path;

use imgqa_image::Image;
use rayon::prelude::*;

use crate::channels::{scored_plane_indices, split_planes};
use crate::error::QualityError;
use crate::filter::{conv2d, log_kernel_2d, pyr_down_2x, separable_filter, sobel_kernel_3};
use crate::fit::fit_ggd;
use crate::ranges::RangeTable;
use crate::scalar::Scalar;
use crate::svm::SvrModel;

/// Number of resolution scales probed by the extractor.
pub const GMLOG_NUM_SCALES: usize = 2;

/// Features per response map: shape, scale, mean.
const FEATURES_PER_MAP: usize = 3;

/// Length of the feature vector produced for each channel plane.
///
/// Layout is scale-major, map-minor: `[s0.GM, s0.LOG, s1.GM, s1.LOG]` with
/// each map contributing `[alpha, sigma, mean]`.
pub const GMLOG_NUM_FEATURES: usize = GMLOG_NUM_SCALES * 2 * FEATURES_PER_MAP;

/// Sigma of the Laplacian-of-Gaussian response kernel.
const LOG_SIGMA: f32 = 0.5;

/// Stable algorithm identifier.
pub const GMLOG_DEFAULT_NAME: &str = "quality-gmlog";

/// Gradient magnitude response map from the 3-tap sobel pair.
fn gradient_magnitude(plane: &Image<f32, 1>) -> Result<Image<f32, 1>, QualityError> {
    let (deriv, smooth) = sobel_kernel_3();

    let mut gx = Image::<f32, 1>::from_size_val(plane.size(), 0.0)?;
    separable_filter(plane, &mut gx, &deriv, &smooth)?;

    let mut gy = Image::<f32, 1>::from_size_val(plane.size(), 0.0)?;
    separable_filter(plane, &mut gy, &smooth, &deriv)?;

    let mut dst = Image::<f32, 1>::from_size_val(plane.size(), 0.0)?;
    dst.as_slice_mut()
        .iter_mut()
        .zip(gx.as_slice().iter().zip(gy.as_slice().iter()))
        .for_each(|(dst, (&gx, &gy))| {
            *dst = (gx * gx + gy * gy).sqrt();
        });

    Ok(dst)
}

/// Laplacian-of-Gaussian response map.
fn log_response(plane: &Image<f32, 1>) -> Result<Image<f32, 1>, QualityError> {
    let (kernel, side) = log_kernel_2d(LOG_SIGMA);
    let mut dst = Image::<f32, 1>::from_size_val(plane.size(), 0.0)?;
    conv2d(plane, &mut dst, &kernel, side)?;
    Ok(dst)
}

/// Extract the fixed-length NSS feature vector of one channel plane.
pub fn plane_features(plane: &Image<f32, 1>) -> Result<Vec<f64>, QualityError> {
    let mut features = Vec::with_capacity(GMLOG_NUM_FEATURES);
    let mut current = plane.clone();

    for scale in 0..GMLOG_NUM_SCALES {
        if scale > 0 {
            current = pyr_down_2x(&current)?;
        }

        for map in [gradient_magnitude(&current)?, log_response(&current)?] {
            let fit = fit_ggd(map.as_slice());
            features.push(fit.alpha);
            features.push(fit.sigma);
            features.push(fit.mean);
        }
    }

    Ok(features)
}

/// Compute the GM-LOG features of an image without a model dependency.
///
/// The result concatenates the per-plane feature vectors in the channel
/// splitter's emission order (each plane contributes
/// [`GMLOG_NUM_FEATURES`] values).
///
/// # Errors
///
/// Returns [`QualityError::UnsupportedChannelCount`] for channel counts
/// outside {1, 3, 4}.
///
/// # Example
///
/// ```
/// use imgqa_image::{Image, ImageSize};
/// use imgqa_metrics::gmlog::{compute_features, GMLOG_NUM_FEATURES};
///
/// let img = Image::<u8, 1>::from_size_val(
///     ImageSize { width: 32, height: 32 },
///     128,
/// ).unwrap();
///
/// let features = compute_features(&img).unwrap();
/// assert_eq!(features.len(), GMLOG_NUM_FEATURES);
/// ```
pub fn compute_features<T, const C: usize>(img: &Image<T, C>) -> Result<Vec<f64>, QualityError>
where
    T: num_traits::NumCast + Copy,
{
    let planes = split_planes(img)?;

    let per_plane = planes
        .par_iter()
        .map(plane_features)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(per_plane.into_iter().flatten().collect())
}

/// GM-LOG quality evaluator bound to a regression model and range table.
pub struct QualityGmlog {
    model: SvrModel,
    range: RangeTable,
}

impl QualityGmlog {
    /// Bind a pre-loaded model and range table.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::DimensionMismatch`] if the range table length
    /// does not equal the model's input width.
    pub fn new(model: SvrModel, range: RangeTable) -> Result<Self, QualityError> {
        model
            .validate()
            .map_err(|e| QualityError::ModelLoad(e.to_string()))?;

        if range.len() != model.input_width() {
            return Err(QualityError::DimensionMismatch {
                expected: model.input_width(),
                found: range.len(),
            });
        }

        Ok(Self { model, range })
    }

    /// Load a model and range table from disk and bind them.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::ModelLoad`] if either resource is missing or
    /// malformed, and [`QualityError::DimensionMismatch`] if they disagree on
    /// the feature width.
    pub fn from_files(
        model_path: impl AsRef<Path>,
        range_path: impl AsRef<Path>,
    ) -> Result<Self, QualityError> {
        let model = SvrModel::from_file(model_path)?;
        let range = RangeTable::from_file(range_path)?;
        Self::new(model, range)
    }

    /// Score an image in one shot against model resources on disk.
    ///
    /// Convenience wrapper over [`from_files`](QualityGmlog::from_files)
    /// followed by [`compute`](QualityGmlog::compute); prefer a long-lived
    /// instance when scoring many images against the same resources.
    pub fn compute_with_resources<T, const C: usize>(
        img: &Image<T, C>,
        model_path: impl AsRef<Path>,
        range_path: impl AsRef<Path>,
    ) -> Result<Scalar, QualityError>
    where
        T: num_traits::NumCast + Copy,
    {
        Self::from_files(model_path, range_path)?.compute(img)
    }

    /// Score one channel plane through the normalize-then-predict pipeline.
    fn score_plane(&self, plane: &Image<f32, 1>) -> Result<f64, QualityError> {
        let features = plane_features(plane)?;
        let normalized = self.range.normalize(&features)?;
        self.model.predict(&normalized)
    }

    /// Compute the per-channel quality scores of an image.
    ///
    /// One score per color plane plus a trailing grayscale score for 3- and
    /// 4-channel input (the alpha plane of 4-channel input is not scored).
    /// Scores are 0 (best) to 100 (worst) and are not clamped.
    pub fn compute<T, const C: usize>(&self, img: &Image<T, C>) -> Result<Scalar, QualityError>
    where
        T: num_traits::NumCast + Copy,
    {
        let planes = split_planes(img)?;
        let indices = scored_plane_indices(C, planes.len());

        let scores = indices
            .par_iter()
            .map(|&i| self.score_plane(&planes[i]))
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = Scalar::default();
        for (slot, score) in scores.into_iter().enumerate() {
            result[slot] = score;
        }

        log::debug!("gmlog scores: {:?}", result.values());

        Ok(result)
    }
}

impl<T, const C: usize> crate::QualityMetric<T, C> for QualityGmlog
where
    T: num_traits::NumCast + Copy,
{
    fn compute(&mut self, img: &Image<T, C>) -> Result<Scalar, QualityError> {
        QualityGmlog::compute(self, img)
    }

    fn default_name(&self) -> &'static str {
        GMLOG_DEFAULT_NAME
    }
}
