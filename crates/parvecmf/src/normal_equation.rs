//! Shared normal-equation inverse
//!
//! Every row solved in a phase uses the same k x k matrix
//! `(c * F^T F + lambda * I)^-1`, built once from the fixed opposite factor
//! matrix F. Building it costs O(n k^2) for the Gramian plus O(k^3) for the
//! inversion, and is amortized over all rows of the phase.

use crate::error::{ParVecMfError, Result};
use ndarray::{Array2, ArrayView2};

/// Compute `(c * F^T F + lambda * I_k)^-1` for an `n x k` matrix F
///
/// For `lambda > 0` and `c > 0` the matrix is symmetric positive definite even
/// when F is rank deficient, so the Cholesky factorization always succeeds.
///
/// # Errors
///
/// `SingularMatrix` when the regularized matrix is not positive definite,
/// which can only happen for `lambda <= 0`.
pub fn regularized_inverse(features: ArrayView2<'_, f64>, confidence: f64, lambda: f64) -> Result<Array2<f64>> {
    let k = features.ncols();

    let mut a = features.t().dot(&features);
    a.mapv_inplace(|v| v * confidence);
    for i in 0..k {
        a[[i, i]] += lambda;
    }

    let l = cholesky(&a)?;
    Ok(invert_from_cholesky(&l))
}

/// Cholesky decomposition `A = L * L^T` of a symmetric matrix
fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if !(diag.is_finite() && diag > 0.0) {
                    return Err(ParVecMfError::SingularMatrix { pivot: i });
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Ok(l)
}

/// Invert `L * L^T` column by column with forward and backward substitution
fn invert_from_cholesky(l: &Array2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut inverse = Array2::<f64>::zeros((n, n));
    let mut y = vec![0.0; n];

    for col in 0..n {
        // L * y = e_col
        for i in 0..n {
            let mut sum = if i == col { 1.0 } else { 0.0 };
            for j in 0..i {
                sum -= l[[i, j]] * y[j];
            }
            y[i] = sum / l[[i, i]];
        }

        // L^T * x = y
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= l[[j, i]] * inverse[[j, col]];
            }
            inverse[[i, col]] = sum / l[[i, i]];
        }
    }

    inverse
}
