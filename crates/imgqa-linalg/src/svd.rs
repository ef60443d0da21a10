//! Singular values of small dense matrices.
//!
//! This module provides a deterministic one-sided Jacobi routine that computes
//! the singular value spectrum of a small `rows x cols` matrix, as needed for
//! block-wise image quality metrics. Only the singular values are produced;
//! the singular vectors are never materialized.
//!
//! # Mathematical Background
//!
//! For any matrix A ∈ ℝᵐˣⁿ the singular values σ₁ ≥ σ₂ ≥ … ≥ σₙ ≥ 0 are the
//! square roots of the eigenvalues of AᵀA. The one-sided Jacobi method applies
//! plane rotations to pairs of columns until all columns are mutually
//! orthogonal; the singular values are then the Euclidean norms of the
//! resulting columns.
//!
//! The sweep order is cyclic and fixed, so two calls on identical input
//! produce identical output.

use thiserror::Error;

/// Convergence threshold on the normalized off-diagonal column inner product.
const JACOBI_EPSILON: f64 = 1e-12;

/// Upper bound on the number of cyclic Jacobi sweeps.
const MAX_SWEEPS: usize = 30;

/// Errors that can occur while computing singular values.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SvdError {
    /// The data length does not match the requested shape.
    #[error("data length ({0}) does not match the shape {1}x{2}")]
    ShapeMismatch(usize, usize, usize),

    /// The requested shape has a zero dimension.
    #[error("matrix dimensions must be non-zero, got {0}x{1}")]
    EmptyMatrix(usize, usize),
}

/// Compute the singular values of a small dense matrix.
///
/// The input is a row-major `rows x cols` matrix. The output contains
/// `min(rows, cols)` singular values sorted in descending order.
///
/// # Arguments
///
/// * `data` - The matrix samples in row-major order, length `rows * cols`.
/// * `rows` - The number of rows.
/// * `cols` - The number of columns.
///
/// # Example
///
/// ```
/// use imgqa_linalg::singular_values;
///
/// // diag(3, 2) embedded in a 2x2 matrix
/// let s = singular_values(&[3.0, 0.0, 0.0, 2.0], 2, 2).unwrap();
/// assert!((s[0] - 3.0).abs() < 1e-5);
/// assert!((s[1] - 2.0).abs() < 1e-5);
/// ```
pub fn singular_values(data: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>, SvdError> {
    if rows == 0 || cols == 0 {
        return Err(SvdError::EmptyMatrix(rows, cols));
    }
    if data.len() != rows * cols {
        return Err(SvdError::ShapeMismatch(data.len(), rows, cols));
    }

    // The one-sided iteration orthogonalizes columns, so work on the matrix
    // orientation with the fewer columns to get min(rows, cols) values.
    let (m, n, transpose) = if rows >= cols {
        (rows, cols, false)
    } else {
        (cols, rows, true)
    };

    // column-major working copy in f64
    let mut a = vec![0.0f64; m * n];
    for r in 0..rows {
        for c in 0..cols {
            let v = data[r * cols + c] as f64;
            if transpose {
                a[r * m + c] = v;
            } else {
                a[c * m + r] = v;
            }
        }
    }

    for _sweep in 0..MAX_SWEEPS {
        let mut off_diag = 0.0f64;

        for p in 0..n - 1 {
            for q in p + 1..n {
                let (alpha, beta, gamma) = {
                    let mut alpha = 0.0;
                    let mut beta = 0.0;
                    let mut gamma = 0.0;
                    for i in 0..m {
                        let ap = a[p * m + i];
                        let aq = a[q * m + i];
                        alpha += ap * ap;
                        beta += aq * aq;
                        gamma += ap * aq;
                    }
                    (alpha, beta, gamma)
                };

                let norm = (alpha * beta).sqrt();
                if norm <= 0.0 || gamma.abs() <= JACOBI_EPSILON * norm {
                    continue;
                }
                off_diag = off_diag.max(gamma.abs() / norm);

                // Jacobi rotation that annihilates the (p, q) inner product
                let zeta = (beta - alpha) / (2.0 * gamma);
                let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;

                for i in 0..m {
                    let ap = a[p * m + i];
                    let aq = a[q * m + i];
                    a[p * m + i] = c * ap - s * aq;
                    a[q * m + i] = s * ap + c * aq;
                }
            }
        }

        if off_diag <= JACOBI_EPSILON {
            break;
        }
    }

    let mut sigma = (0..n)
        .map(|j| {
            let col = &a[j * m..(j + 1) * m];
            col.iter().map(|&x| x * x).sum::<f64>().sqrt() as f32
        })
        .collect::<Vec<f32>>();

    sigma.sort_by(|x, y| y.total_cmp(x));

    Ok(sigma)
}
