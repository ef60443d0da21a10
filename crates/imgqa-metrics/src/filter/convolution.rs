use imgqa_image::{Image, ImageError, ImageSize};
use rayon::prelude::*;

use super::kernels;

/// Apply a separable filter to an image.
///
/// Performs a horizontal 1D convolution followed by a vertical one, using
/// zero padding at the borders. Rows are processed in parallel.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_x` - The horizontal kernel.
/// * `kernel_y` - The vertical kernel.
pub fn separable_filter<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let rows = src.rows();
    let cols = src.cols();

    let half_x = kernel_x.len() / 2;
    let half_y = kernel_y.len() / 2;

    let src_data = src.as_slice();
    let mut temp = vec![0.0f32; src_data.len()];

    // horizontal pass
    temp.par_chunks_mut(cols * C)
        .enumerate()
        .for_each(|(r, row_temp)| {
            let row_offset = r * cols * C;
            for c in 0..cols {
                let mut acc = [0.0f32; C];
                for (i, &k) in kernel_x.iter().enumerate() {
                    let x = c as isize + i as isize - half_x as isize;
                    if x >= 0 && x < cols as isize {
                        let idx = row_offset + x as usize * C;
                        for (ch, acc_val) in acc.iter_mut().enumerate() {
                            *acc_val += src_data[idx + ch] * k;
                        }
                    }
                }
                row_temp[c * C..c * C + C].copy_from_slice(&acc);
            }
        });

    // vertical pass
    dst.as_slice_mut()
        .par_chunks_mut(cols * C)
        .enumerate()
        .for_each(|(r, row_dst)| {
            for c in 0..cols {
                let mut acc = [0.0f32; C];
                for (i, &k) in kernel_y.iter().enumerate() {
                    let y = r as isize + i as isize - half_y as isize;
                    if y >= 0 && y < rows as isize {
                        let idx = y as usize * cols * C + c * C;
                        for (ch, acc_val) in acc.iter_mut().enumerate() {
                            *acc_val += temp[idx + ch] * k;
                        }
                    }
                }
                row_dst[c * C..c * C + C].copy_from_slice(&acc);
            }
        });

    Ok(())
}

/// Apply a dense 2D convolution to an image.
///
/// Used for the non-separable Laplacian-of-Gaussian kernel. Zero padding at
/// the borders; rows are processed in parallel.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel` - The kernel taps in row-major order, `side * side` long.
/// * `side` - The kernel side length (odd).
pub fn conv2d<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel: &[f32],
    side: usize,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }
    if kernel.len() != side * side {
        return Err(ImageError::InvalidChannelShape(kernel.len(), side * side));
    }

    let rows = src.rows();
    let cols = src.cols();
    let radius = (side / 2) as isize;
    let src_data = src.as_slice();

    dst.as_slice_mut()
        .par_chunks_mut(cols * C)
        .enumerate()
        .for_each(|(r, row_dst)| {
            for c in 0..cols {
                let mut acc = [0.0f32; C];
                for ky in 0..side {
                    let y = r as isize + ky as isize - radius;
                    if y < 0 || y >= rows as isize {
                        continue;
                    }
                    for kx in 0..side {
                        let x = c as isize + kx as isize - radius;
                        if x < 0 || x >= cols as isize {
                            continue;
                        }
                        let k = kernel[ky * side + kx];
                        let idx = y as usize * cols * C + x as usize * C;
                        for (ch, acc_val) in acc.iter_mut().enumerate() {
                            *acc_val += src_data[idx + ch] * k;
                        }
                    }
                }
                row_dst[c * C..c * C + C].copy_from_slice(&acc);
            }
        });

    Ok(())
}

/// Downsample an image to half resolution.
///
/// Blurs with the 5-tap pyramid gaussian and keeps every other row and
/// column, as in a classic image pyramid step.
pub fn pyr_down_2x<const C: usize>(src: &Image<f32, C>) -> Result<Image<f32, C>, ImageError> {
    let kernel = kernels::pyramid_kernel_1d();
    let mut blurred = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    separable_filter(src, &mut blurred, &kernel, &kernel)?;

    let out_size = ImageSize {
        width: src.width().div_ceil(2),
        height: src.height().div_ceil(2),
    };

    let cols = src.cols();
    let blurred_data = blurred.as_slice();
    let mut data = Vec::with_capacity(out_size.width * out_size.height * C);
    for r in (0..src.rows()).step_by(2) {
        for c in (0..cols).step_by(2) {
            let idx = (r * cols + c) * C;
            data.extend_from_slice(&blurred_data[idx..idx + C]);
        }
    }

    Image::new(out_size, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgqa_image::{Image, ImageError, ImageSize};

    #[test]
    fn test_separable_filter_impulse() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 5,
            height: 5,
        };

        #[rustfmt::skip]
        let img = Image::new(
            size,
            vec![
                0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 1.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0,
            ],
        )?;

        let mut dst = Image::<f32, 1>::from_size_val(img.size(), 0.0)?;
        let kernel_x = vec![1.0, 1.0, 1.0];
        let kernel_y = vec![1.0, 1.0, 1.0];
        separable_filter(&img, &mut dst, &kernel_x, &kernel_y)?;

        #[rustfmt::skip]
        assert_eq!(
            dst.as_slice(),
            &[
                0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 1.0, 1.0, 1.0, 0.0,
                0.0, 1.0, 1.0, 1.0, 0.0,
                0.0, 1.0, 1.0, 1.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0,
            ]
        );

        let xsum = dst.as_slice().iter().sum::<f32>();
        assert_eq!(xsum, 9.0);

        Ok(())
    }

    #[test]
    fn test_conv2d_matches_separable_box() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 6,
            height: 4,
        };
        let data = (0..24).map(|i| i as f32).collect::<Vec<f32>>();
        let img = Image::<f32, 1>::new(size, data)?;

        let mut dst_sep = Image::<f32, 1>::from_size_val(size, 0.0)?;
        separable_filter(&img, &mut dst_sep, &[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0])?;

        let mut dst_conv = Image::<f32, 1>::from_size_val(size, 0.0)?;
        conv2d(&img, &mut dst_conv, &[1.0f32; 9], 3)?;

        for (a, b) in dst_sep.as_slice().iter().zip(dst_conv.as_slice().iter()) {
            assert!((a - b).abs() < 1e-4);
        }

        Ok(())
    }

    #[test]
    fn test_conv2d_kernel_shape() {
        let size = ImageSize {
            width: 3,
            height: 3,
        };
        let img = Image::<f32, 1>::from_size_val(size, 0.0).unwrap();
        let mut dst = Image::<f32, 1>::from_size_val(size, 0.0).unwrap();

        let res = conv2d(&img, &mut dst, &[1.0f32; 8], 3);
        assert!(res.is_err());
    }

    #[test]
    fn test_pyr_down_2x() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 8,
            height: 6,
        };
        let img = Image::<f32, 1>::from_size_val(size, 2.0)?;

        let down = pyr_down_2x(&img)?;
        assert_eq!(down.width(), 4);
        assert_eq!(down.height(), 3);

        // interior of a constant image stays constant through the pyramid blur
        assert!((down.get_pixel(1, 1, 0)? - 2.0).abs() < 1e-4);

        Ok(())
    }

    #[test]
    fn test_pyr_down_odd_size() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 5,
            height: 5,
        };
        let img = Image::<f32, 1>::from_size_val(size, 1.0)?;
        let down = pyr_down_2x(&img)?;
        assert_eq!(down.width(), 3);
        assert_eq!(down.height(), 3);
        Ok(())
    }
}
