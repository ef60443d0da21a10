/// Create a gaussian blur kernel.
///
/// # Arguments
///
/// * `kernel_size` - The size of the kernel.
/// * `sigma` - The sigma of the gaussian kernel.
///
/// # Returns
///
/// A normalized vector of the kernel taps.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f32) -> Vec<f32> {
    let mut kernel = Vec::with_capacity(kernel_size);

    let mean = (kernel_size - 1) as f32 / 2.0;
    let sigma_sq = sigma * sigma;

    for i in 0..kernel_size {
        let x = i as f32 - mean;
        kernel.push((-(x * x) / (2.0 * sigma_sq)).exp());
    }

    let norm = kernel.iter().sum::<f32>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

/// The 3-tap sobel kernel pair (derivative, smoothing).
pub fn sobel_kernel_3() -> (Vec<f32>, Vec<f32>) {
    (vec![-1.0, 0.0, 1.0], vec![1.0, 2.0, 1.0])
}

/// Create a 2D Laplacian-of-Gaussian kernel.
///
/// The kernel radius is `ceil(3 * sigma)` and the taps follow the closed-form
/// LoG: `(x² + y² - 2σ²) / σ⁴ · exp(-(x² + y²) / (2σ²))`, shifted so the taps
/// sum to zero (a flat input produces a zero response).
///
/// # Returns
///
/// The kernel taps in row-major order together with the kernel side length.
pub fn log_kernel_2d(sigma: f32) -> (Vec<f32>, usize) {
    let radius = (3.0 * sigma).ceil() as isize;
    let side = (2 * radius + 1) as usize;
    let sigma_sq = (sigma * sigma) as f64;

    let mut kernel = Vec::with_capacity(side * side);
    for y in -radius..=radius {
        for x in -radius..=radius {
            let r_sq = (x * x + y * y) as f64;
            let val = (r_sq - 2.0 * sigma_sq) / (sigma_sq * sigma_sq)
                * (-r_sq / (2.0 * sigma_sq)).exp();
            kernel.push(val);
        }
    }

    // remove the DC component
    let mean = kernel.iter().sum::<f64>() / kernel.len() as f64;
    let kernel = kernel.into_iter().map(|v| (v - mean) as f32).collect();

    (kernel, side)
}

/// The 5-tap gaussian kernel used for pyramid downsampling.
pub(crate) fn pyramid_kernel_1d() -> Vec<f32> {
    [1.0, 4.0, 6.0, 4.0, 1.0].iter().map(|&x| x / 16.0).collect()
}
