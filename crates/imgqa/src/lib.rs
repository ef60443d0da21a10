#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use imgqa_image as image;

#[doc(inline)]
pub use imgqa_linalg as linalg;

#[doc(inline)]
pub use imgqa_metrics as metrics;
