#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Module to calculate singular values of small dense matrices
pub mod svd;

pub use crate::svd::{singular_values, SvdError};
