use imgqa_image::ImageError;

/// Errors produced by the quality metrics.
#[derive(thiserror::Error, Debug)]
pub enum QualityError {
    /// The input image channel count is not supported by the metric.
    #[error("unsupported channel count: {0} (supported: 1, 3, 4)")]
    UnsupportedChannelCount(usize),

    /// A model or range resource is missing, unreadable or has a bad schema.
    #[error("failed to load model resource: {0}")]
    ModelLoad(String),

    /// Two vectors that must have equal length do not.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The length required by the receiving side.
        expected: usize,
        /// The length actually provided.
        found: usize,
    },

    /// Reference and comparison images have incompatible spatial dimensions,
    /// or the block size does not admit a valid partition.
    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    /// A reference-bound operation was invoked without a bound reference.
    #[error("no reference image bound to this instance")]
    EmptyReference,

    /// The underlying regression model failed during inference.
    #[error("prediction failed: {0}")]
    Prediction(String),

    /// Error bubbled up from the image container.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Error bubbled up from the singular value routine.
    #[error(transparent)]
    Linalg(#[from] imgqa_linalg::SvdError),
}
