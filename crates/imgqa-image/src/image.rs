use crate::error::ImageError;

/// Image size in pixels
///
/// A struct to represent the size of an image in pixels.
///
/// # Examples
///
/// ```
/// use imgqa_image::ImageSize;
///
/// let image_size = ImageSize {
///   width: 10,
///   height: 20,
/// };
///
/// assert_eq!(image_size.width, 10);
/// assert_eq!(image_size.height, 20);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

/// Represents an image with pixel data.
///
/// The image is stored as a row-major (H, W, C) buffer, where H is the height,
/// W the width and C the number of channels.
#[derive(Clone)]
pub struct Image<T, const C: usize> {
    size: ImageSize,
    data: Vec<T>,
}

impl<T, const C: usize> Image<T, C> {
    /// Create a new image from pixel data.
    ///
    /// # Arguments
    ///
    /// * `size` - The size of the image in pixels.
    /// * `data` - The pixel data of the image in row-major (H, W, C) order.
    ///
    /// # Errors
    ///
    /// If the length of the pixel data does not match the image size, an error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgqa_image::{Image, ImageSize};
    ///
    /// let image = Image::<u8, 3>::new(
    ///    ImageSize {
    ///       width: 10,
    ///       height: 20,
    ///    },
    ///    vec![0u8; 10 * 20 * 3],
    /// ).unwrap();
    ///
    /// assert_eq!(image.size().width, 10);
    /// assert_eq!(image.size().height, 20);
    /// assert_eq!(image.num_channels(), 3);
    /// ```
    pub fn new(size: ImageSize, data: Vec<T>) -> Result<Self, ImageError> {
        if data.len() != size.width * size.height * C {
            return Err(ImageError::InvalidChannelShape(
                data.len(),
                size.width * size.height * C,
            ));
        }

        Ok(Self { size, data })
    }

    /// Create a new image with the given size, filled with a default value.
    pub fn from_size_val(size: ImageSize, val: T) -> Result<Self, ImageError>
    where
        T: Clone,
    {
        let data = vec![val; size.width * size.height * C];
        Image::new(size, data)
    }

    /// Get the size of the image in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Get the number of columns of the image.
    pub fn cols(&self) -> usize {
        self.size.width
    }

    /// Get the number of rows of the image.
    pub fn rows(&self) -> usize {
        self.size.height
    }

    /// Get the width of the image in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Get the height of the image in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Get the number of channels in the image.
    pub fn num_channels(&self) -> usize {
        C
    }

    /// Get the total number of samples (width * height * channels).
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Get the pixel data as a flat slice in (H, W, C) order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Get the pixel data as a mutable flat slice in (H, W, C) order.
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the image and return the pixel data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Get the pixel value at the given coordinates.
    ///
    /// # Errors
    ///
    /// If the coordinates or the channel index are out of bounds, an error is returned.
    pub fn get_pixel(&self, x: usize, y: usize, ch: usize) -> Result<T, ImageError>
    where
        T: Copy,
    {
        if x >= self.width() || y >= self.height() {
            return Err(ImageError::PixelIndexOutOfBounds(
                x,
                y,
                self.width(),
                self.height(),
            ));
        }

        if ch >= C {
            return Err(ImageError::ChannelIndexOutOfBounds(ch, C));
        }

        Ok(self.data[(y * self.width() + x) * C + ch])
    }

    /// Cast the pixel data of the image to a different type.
    ///
    /// # Returns
    ///
    /// A new image with the pixel data cast to the given type.
    pub fn cast<U>(&self) -> Result<Image<U, C>, ImageError>
    where
        U: num_traits::NumCast,
        T: num_traits::NumCast + Copy,
    {
        let casted_data = self
            .data
            .iter()
            .map(|&x| U::from(x).ok_or(ImageError::CastError))
            .collect::<Result<Vec<U>, ImageError>>()?;

        Image::new(self.size, casted_data)
    }

    /// Cast the pixel data to a different type and scale it.
    ///
    /// # Arguments
    ///
    /// * `scale` - The scale to multiply the pixel data with after the cast.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgqa_image::{Image, ImageSize};
    ///
    /// let image_u8 = Image::<u8, 1>::new(
    ///     ImageSize { width: 2, height: 1 },
    ///     vec![0u8, 255],
    /// ).unwrap();
    ///
    /// let image_f32 = image_u8.cast_and_scale::<f32>(1.0 / 255.0).unwrap();
    /// assert_eq!(image_f32.as_slice(), &[0.0, 1.0]);
    /// ```
    pub fn cast_and_scale<U>(&self, scale: U) -> Result<Image<U, C>, ImageError>
    where
        U: num_traits::NumCast + std::ops::Mul<Output = U> + Copy,
        T: num_traits::NumCast + Copy,
    {
        let casted_data = self
            .data
            .iter()
            .map(|&x| {
                let xu = U::from(x).ok_or(ImageError::CastError)?;
                Ok(xu * scale)
            })
            .collect::<Result<Vec<U>, ImageError>>()?;

        Image::new(self.size, casted_data)
    }

    /// Get a single channel of the image.
    ///
    /// # Errors
    ///
    /// If the channel index is out of bounds, an error is returned.
    pub fn channel(&self, channel: usize) -> Result<Image<T, 1>, ImageError>
    where
        T: Copy,
    {
        if channel >= C {
            return Err(ImageError::ChannelIndexOutOfBounds(channel, C));
        }

        let channel_data = self
            .data
            .iter()
            .skip(channel)
            .step_by(C)
            .copied()
            .collect::<Vec<T>>();

        Image::new(self.size, channel_data)
    }

    /// Split the image into its channels.
    ///
    /// # Returns
    ///
    /// A vector of single channel images in channel order.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgqa_image::{Image, ImageSize};
    ///
    /// let image = Image::<f32, 2>::from_size_val(
    ///     ImageSize { width: 10, height: 20 },
    ///     0.0f32,
    /// ).unwrap();
    ///
    /// let channels = image.split_channels().unwrap();
    /// assert_eq!(channels.len(), 2);
    /// ```
    pub fn split_channels(&self) -> Result<Vec<Image<T, 1>>, ImageError>
    where
        T: Copy,
    {
        let mut channels = Vec::with_capacity(C);

        for i in 0..C {
            channels.push(self.channel(i)?);
        }

        Ok(channels)
    }
}
