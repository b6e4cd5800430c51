//! Closed-form solve of one factor row
//!
//! Minimizes `sum_i c (r_i - theta . F_i)^2 + lambda ||theta - e||^2` over the
//! observed ratings r of one user (or item), which gives
//! `theta = (c r^T F + lambda e^T) M` with `M = (c F^T F + lambda I)^-1`.
//! Regularizing toward the embedding anchor e instead of zero lets lambda
//! trade collaborative signal against content signal.

use crate::data_model::SparseRow;
use crate::error::{ParVecMfError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Solve one row against the opposite factor matrix and its shared inverse
pub fn solve_row(
    ratings: &SparseRow,
    anchor: ArrayView1<'_, f64>,
    features: ArrayView2<'_, f64>,
    inverse: ArrayView2<'_, f64>,
    lambda: f64,
    confidence: f64,
) -> Result<Array1<f64>> {
    let k = features.ncols();

    if ratings.dimension() != features.nrows() {
        return Err(ParVecMfError::DimensionMismatch {
            what: "rating vector",
            expected: features.nrows(),
            found: ratings.dimension(),
        });
    }
    if anchor.len() != k {
        return Err(ParVecMfError::DimensionMismatch {
            what: "embedding anchor",
            expected: k,
            found: anchor.len(),
        });
    }
    if inverse.dim() != (k, k) {
        return Err(ParVecMfError::DimensionMismatch {
            what: "inverse matrix",
            expected: k,
            found: inverse.nrows().max(inverse.ncols()),
        });
    }

    // b = c r^T F + lambda e
    let mut b = anchor.mapv(|v| v * lambda);
    for &(idx, rating) in ratings.entries() {
        b.scaled_add(confidence * rating, &features.row(idx));
    }

    Ok(b.dot(&inverse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normal_equation::regularized_inverse;
    use ndarray::{array, Array1, Array2};

    fn dense_row(values: &[f64]) -> SparseRow {
        let entries = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .collect();
        SparseRow::new(entries, values.len()).unwrap()
    }

    fn features() -> Array2<f64> {
        array![
            [0.9, 0.1, 0.3],
            [0.2, 1.4, -0.5],
            [1.1, 0.0, 0.8],
            [-0.3, 0.7, 0.2],
        ]
    }

    #[test]
    fn test_solution_satisfies_normal_equation() {
        let f = features();
        let ratings = [4.0, 0.0, 2.5, 1.0];
        let anchor = array![0.2, -0.1, 0.4];
        let (lambda, c) = (0.7, 2.0);

        let m = regularized_inverse(f.view(), c, lambda).unwrap();
        let theta = solve_row(&dense_row(&ratings), anchor.view(), f.view(), m.view(), lambda, c).unwrap();

        // c F^T F theta + lambda theta == c F^T r + lambda e
        let lhs = f.t().dot(&f).dot(&theta) * c + &theta * lambda;
        let r = Array1::from(ratings.to_vec());
        let rhs = f.t().dot(&r) * c + &anchor * lambda;

        for (a, b) in lhs.iter().zip(rhs.iter()) {
            assert!((a - b).abs() < 1e-9, "residual {} too large", a - b);
        }
    }

    #[test]
    fn test_anchor_at_least_squares_solution_is_kept() {
        let f = features();
        let target = array![0.5, -1.0, 2.0];
        let r = f.dot(&target);
        let (lambda, c) = (3.0, 1.0);

        let m = regularized_inverse(f.view(), c, lambda).unwrap();
        let theta = solve_row(&dense_row(r.as_slice().unwrap()), target.view(), f.view(), m.view(), lambda, c)
            .unwrap();

        for (a, b) in theta.iter().zip(target.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_no_ratings_pulls_toward_anchor() {
        let f = features();
        let anchor = array![1.0, -2.0, 0.5];
        let lambda = 0.5;
        let empty = SparseRow::empty(4);

        let mut previous_gap = f64::INFINITY;
        for &c in &[1.0, 1e-2, 1e-4, 1e-8] {
            let m = regularized_inverse(f.view(), c, lambda).unwrap();
            let theta = solve_row(&empty, anchor.view(), f.view(), m.view(), lambda, c).unwrap();
            assert!(theta.iter().all(|v| v.is_finite()));

            let gap = (&theta - &anchor).mapv(|v| v * v).sum();
            assert!(gap <= previous_gap);
            previous_gap = gap;
        }
        assert!(previous_gap < 1e-6);
    }

    #[test]
    fn test_no_ratings_and_zero_anchor_gives_zero() {
        let f = features();
        let m = regularized_inverse(f.view(), 1.0, 0.1).unwrap();
        let theta = solve_row(&SparseRow::empty(4), Array1::zeros(3).view(), f.view(), m.view(), 0.1, 1.0).unwrap();
        assert!(theta.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_solve_is_deterministic() {
        let f = features();
        let row = dense_row(&[1.0, 2.0, 0.0, 5.0]);
        let anchor = array![0.1, 0.2, 0.3];
        let m = regularized_inverse(f.view(), 1.0, 0.2).unwrap();

        let a = solve_row(&row, anchor.view(), f.view(), m.view(), 0.2, 1.0).unwrap();
        let b = solve_row(&row, anchor.view(), f.view(), m.view(), 0.2, 1.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dimension_mismatches_fail_fast() {
        let f = features();
        let m = regularized_inverse(f.view(), 1.0, 0.1).unwrap();
        let anchor = array![0.0, 0.0, 0.0];

        let short_row = SparseRow::new(vec![(0, 1.0)], 3).unwrap();
        assert!(matches!(
            solve_row(&short_row, anchor.view(), f.view(), m.view(), 0.1, 1.0),
            Err(ParVecMfError::DimensionMismatch { what: "rating vector", .. })
        ));

        let short_anchor = array![0.0, 0.0];
        assert!(matches!(
            solve_row(&SparseRow::empty(4), short_anchor.view(), f.view(), m.view(), 0.1, 1.0),
            Err(ParVecMfError::DimensionMismatch { what: "embedding anchor", .. })
        ));

        let wrong_inverse = Array2::<f64>::eye(2);
        assert!(matches!(
            solve_row(&SparseRow::empty(4), anchor.view(), f.view(), wrong_inverse.view(), 0.1, 1.0),
            Err(ParVecMfError::DimensionMismatch { what: "inverse matrix", .. })
        ));
    }
}
