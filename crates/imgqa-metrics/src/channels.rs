//! Decomposition of an input image into the single channel planes scored by
//! the quality metrics.

use imgqa_image::{Image, ImageSize};

use crate::error::QualityError;

/// RGB weights for the appended grayscale plane.
const RW: f64 = 0.299;
const GW: f64 = 0.587;
const BW: f64 = 0.114;

/// Split an image into independent single channel `f32` planes.
///
/// For a 1-channel image the result holds that single plane. For 3- and
/// 4-channel images the result holds one plane per source channel followed by
/// a grayscale plane derived from the first three channels with
/// `Y = 0.299 R + 0.587 G + 0.114 B`; the grayscale plane is always last.
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
/// use imgqa_metrics::channels::split_planes;
///
/// let img = Image::<u8, 3>::from_size_val(
///     ImageSize { width: 4, height: 4 },
///     128,
/// ).unwrap();
///
/// let planes = split_planes(&img).unwrap();
/// assert_eq!(planes.len(), 4);
/// ```
pub fn split_planes<T, const C: usize>(
    img: &Image<T, C>,
) -> Result<Vec<Image<f32, 1>>, QualityError>
where
    T: num_traits::NumCast + Copy,
{
    if !matches!(C, 1 | 3 | 4) {
        return Err(QualityError::UnsupportedChannelCount(C));
    }

    let img = img.cast::<f32>()?;
    let mut planes = img.split_channels()?;

    if C >= 3 {
        planes.push(luma_plane(&planes[0], &planes[1], &planes[2])?);
    }

    Ok(planes)
}

/// The plane indices that receive a score slot for a given source channel
/// count.
///
/// Slots fill in plane order; for 4-channel input the alpha plane is skipped
/// so the trailing grayscale score still lands in the last slot.
pub(crate) fn scored_plane_indices(channels: usize, num_planes: usize) -> Vec<usize> {
    if channels == 4 {
        vec![0, 1, 2, 4]
    } else {
        (0..num_planes).collect()
    }
}

/// Combine three color planes into a grayscale plane with the fixed luma
/// weighting used across both metrics.
fn luma_plane(
    r: &Image<f32, 1>,
    g: &Image<f32, 1>,
    b: &Image<f32, 1>,
) -> Result<Image<f32, 1>, QualityError> {
    let data = r
        .as_slice()
        .iter()
        .zip(g.as_slice().iter())
        .zip(b.as_slice().iter())
        .map(|((&r, &g), &b)| (RW * r as f64 + GW * g as f64 + BW * b as f64) as f32)
        .collect::<Vec<f32>>();

    let plane = Image::new(
        ImageSize {
            width: r.width(),
            height: r.height(),
        },
        data,
    )?;

    Ok(plane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use imgqa_image::{Image, ImageSize};

    #[test]
    fn split_single_channel() -> Result<(), QualityError> {
        let img = Image::<u8, 1>::new(
            ImageSize {
                width: 2,
                height: 1,
            },
            vec![10, 20],
        )?;

        let planes = split_planes(&img)?;
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].as_slice(), &[10.0, 20.0]);

        Ok(())
    }

    #[test]
    fn split_rgb_appends_gray() -> Result<(), QualityError> {
        let img = Image::<f32, 3>::new(
            ImageSize {
                width: 1,
                height: 1,
            },
            vec![100.0, 50.0, 200.0],
        )?;

        let planes = split_planes(&img)?;
        assert_eq!(planes.len(), 4);
        assert_eq!(planes[0].as_slice(), &[100.0]);
        assert_eq!(planes[1].as_slice(), &[50.0]);
        assert_eq!(planes[2].as_slice(), &[200.0]);

        let expected = 0.299 * 100.0 + 0.587 * 50.0 + 0.114 * 200.0;
        assert_relative_eq!(planes[3].as_slice()[0], expected as f32, epsilon = 1e-4);

        Ok(())
    }

    #[test]
    fn split_rgba_appends_gray_last() -> Result<(), QualityError> {
        let img = Image::<u8, 4>::from_size_val(
            ImageSize {
                width: 2,
                height: 2,
            },
            50,
        )?;

        let planes = split_planes(&img)?;
        assert_eq!(planes.len(), 5);
        // uniform input: gray equals the channel value
        assert_relative_eq!(planes[4].as_slice()[0], 50.0, epsilon = 1e-3);

        Ok(())
    }

    #[test]
    fn split_two_channels_rejected() {
        let img = Image::<f32, 2>::from_size_val(
            ImageSize {
                width: 2,
                height: 2,
            },
            0.0,
        )
        .unwrap();

        let res = split_planes(&img);
        assert!(matches!(res, Err(QualityError::UnsupportedChannelCount(2))));
    }
}
