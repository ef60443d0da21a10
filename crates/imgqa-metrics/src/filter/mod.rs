//! Image filtering primitives used by the feature extractors.

mod convolution;
mod kernels;

pub use convolution::{conv2d, pyr_down_2x, separable_filter};
pub use kernels::{gaussian_kernel_1d, log_kernel_2d, sobel_kernel_3};
