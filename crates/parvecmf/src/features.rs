//! Feature store: the user/item factor matrices and their embedding anchors

use crate::embeddings::Embeddings;
use crate::error::{ParVecMfError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;

/// Upper bound (exclusive) of the random item-factor initialization
const ITEM_INIT_SCALE: f64 = 0.1;

/// Dense matrices of one factorization run
///
/// - `user_features` (U): `num_users x k`, starts at zero
/// - `item_features` (V): `num_items x k`, starts uniform in `[0, 0.1)`
/// - `user_embeddings` (I) and `item_embeddings` (J): same shapes, read-only
///   regularization anchors
///
/// An index with no embedding in its source keeps a zero anchor, which makes
/// that row fall back to ordinary ridge regularization toward zero.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    num_features: usize,
    user_features: Array2<f64>,
    item_features: Array2<f64>,
    user_embeddings: Array2<f64>,
    item_embeddings: Array2<f64>,
}

impl FeatureStore {
    pub fn new<R: Rng + ?Sized>(
        num_users: usize,
        num_items: usize,
        num_features: usize,
        user_embeddings: &Embeddings,
        item_embeddings: &Embeddings,
        rng: &mut R,
    ) -> Result<Self> {
        let user_embeddings = anchor_matrix("user", num_users, num_features, user_embeddings)?;
        let item_embeddings = anchor_matrix("item", num_items, num_features, item_embeddings)?;

        let user_features = Array2::<f64>::zeros((num_users, num_features));
        let item_features = Array2::from_shape_simple_fn((num_items, num_features), || {
            rng.gen::<f64>() * ITEM_INIT_SCALE
        });

        Ok(Self {
            num_features,
            user_features,
            item_features,
            user_embeddings,
            item_embeddings,
        })
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_users(&self) -> usize {
        self.user_features.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.item_features.nrows()
    }

    pub fn user_features(&self) -> ArrayView2<'_, f64> {
        self.user_features.view()
    }

    pub fn item_features(&self) -> ArrayView2<'_, f64> {
        self.item_features.view()
    }

    pub fn user_embeddings(&self) -> ArrayView2<'_, f64> {
        self.user_embeddings.view()
    }

    pub fn item_embeddings(&self) -> ArrayView2<'_, f64> {
        self.item_embeddings.view()
    }

    pub fn user_feature_row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.user_features.row(index)
    }

    pub fn item_feature_row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.item_features.row(index)
    }

    pub fn user_embedding(&self, index: usize) -> ArrayView1<'_, f64> {
        self.user_embeddings.row(index)
    }

    pub fn item_embedding(&self, index: usize) -> ArrayView1<'_, f64> {
        self.item_embeddings.row(index)
    }

    /// Overwrite the k entries of one user factor row
    pub fn set_user_row(&mut self, index: usize, row: ArrayView1<'_, f64>) -> Result<()> {
        set_row(&mut self.user_features, index, row)
    }

    /// Overwrite the k entries of one item factor row
    pub fn set_item_row(&mut self, index: usize, row: ArrayView1<'_, f64>) -> Result<()> {
        set_row(&mut self.item_features, index, row)
    }

    /// Replace U after a completed user phase
    pub(crate) fn replace_user_features(&mut self, features: Array2<f64>) -> Result<()> {
        check_shape("user features", self.user_features.dim(), features.dim())?;
        self.user_features = features;
        Ok(())
    }

    /// Replace V after a completed item phase
    pub(crate) fn replace_item_features(&mut self, features: Array2<f64>) -> Result<()> {
        check_shape("item features", self.item_features.dim(), features.dim())?;
        self.item_features = features;
        Ok(())
    }

    /// Consume the store, keeping only U and V
    pub fn into_factors(self) -> (Array2<f64>, Array2<f64>) {
        (self.user_features, self.item_features)
    }
}

fn anchor_matrix(
    kind: &'static str,
    rows: usize,
    num_features: usize,
    embeddings: &Embeddings,
) -> Result<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((rows, num_features));

    for (&idx, values) in embeddings {
        if idx >= rows {
            return Err(ParVecMfError::DimensionMismatch {
                what: "embedding index",
                expected: rows,
                found: idx,
            });
        }
        if values.len() != num_features {
            return Err(ParVecMfError::DimensionMismatch {
                what: "embedding length",
                expected: num_features,
                found: values.len(),
            });
        }
        matrix
            .row_mut(idx)
            .assign(&ArrayView1::from(values.as_slice()));
    }

    let missing = rows - embeddings.len();
    if missing > 0 {
        tracing::warn!(
            kind,
            missing,
            total = rows,
            "embeddings missing for some rows, anchoring them at zero"
        );
    }

    Ok(matrix)
}

fn set_row(matrix: &mut Array2<f64>, index: usize, row: ArrayView1<'_, f64>) -> Result<()> {
    if index >= matrix.nrows() {
        return Err(ParVecMfError::DimensionMismatch {
            what: "row index",
            expected: matrix.nrows(),
            found: index,
        });
    }
    if row.len() != matrix.ncols() {
        return Err(ParVecMfError::DimensionMismatch {
            what: "factor row length",
            expected: matrix.ncols(),
            found: row.len(),
        });
    }
    matrix.row_mut(index).assign(&row);
    Ok(())
}

fn check_shape(what: &'static str, expected: (usize, usize), found: (usize, usize)) -> Result<()> {
    if expected.1 != found.1 {
        return Err(ParVecMfError::DimensionMismatch {
            what,
            expected: expected.1,
            found: found.1,
        });
    }
    if expected.0 != found.0 {
        return Err(ParVecMfError::DimensionMismatch {
            what,
            expected: expected.0,
            found: found.0,
        });
    }
    Ok(())
}
