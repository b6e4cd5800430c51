//! ParVecMF alternating optimization
//!
//! Implements the ParVecMF methodology ("ParVecMF: A Paragraph Vector-based
//! Matrix Factorization Recommender System", arXiv:1706.07513): alternating
//! least squares where each factor row is regularized toward a paragraph-vector
//! embedding of the user or item rather than toward zero.
//!
//! Each iteration runs two phases. The user phase holds V fixed and solves
//! every user row in parallel; the item phase then holds the new U fixed and
//! solves every item row. Within a phase rows are solved against the same
//! snapshot of the opposite matrix (Jacobi style), and the phase writes into a
//! fresh matrix that only replaces the old one once every row has succeeded.

use crate::config::FactorizerConfig;
use crate::data_model::{RatingRows, RatingSource};
use crate::embeddings::{load_embeddings, Embeddings};
use crate::error::{ParVecMfError, Result};
use crate::features::FeatureStore;
use crate::id_mapping::IdMapping;
use crate::normal_equation::regularized_inverse;
use crate::solver::solve_row;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

/// Which factor matrix a phase updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    User,
    Item,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::User => write!(f, "user"),
            Phase::Item => write!(f, "item"),
        }
    }
}

/// Something that turns a rating source into user and item factor matrices
pub trait Factorizer {
    fn factorize(&self, source: &dyn RatingSource) -> Result<Factorization>;
}

/// Result of a factorization run
#[derive(Debug, Clone)]
pub struct Factorization {
    user_features: Array2<f64>,
    item_features: Array2<f64>,
    mapping: IdMapping,
}

impl Factorization {
    pub fn new(user_features: Array2<f64>, item_features: Array2<f64>, mapping: IdMapping) -> Self {
        Self {
            user_features,
            item_features,
            mapping,
        }
    }

    /// U: `num_users x k`, rows in the order of [`Factorization::mapping`]
    pub fn user_features(&self) -> ArrayView2<'_, f64> {
        self.user_features.view()
    }

    /// V: `num_items x k`
    pub fn item_features(&self) -> ArrayView2<'_, f64> {
        self.item_features.view()
    }

    pub fn mapping(&self) -> &IdMapping {
        &self.mapping
    }

    pub fn num_features(&self) -> usize {
        self.user_features.ncols()
    }

    pub fn user_feature_row(&self, user_id: &str) -> Option<ArrayView1<'_, f64>> {
        let idx = self.mapping.users.index(user_id)?;
        Some(self.user_features.row(idx))
    }

    pub fn item_feature_row(&self, item_id: &str) -> Option<ArrayView1<'_, f64>> {
        let idx = self.mapping.items.index(item_id)?;
        Some(self.item_features.row(idx))
    }

    /// Estimated rating: dot product of the user and item factor rows
    pub fn estimate(&self, user_id: &str, item_id: &str) -> Result<f64> {
        let user_idx = self.mapping.users.require(user_id)?;
        let item_idx = self.mapping.items.require(item_id)?;
        Ok(self
            .user_features
            .row(user_idx)
            .dot(&self.item_features.row(item_idx)))
    }

    pub fn user_feature_sum(&self) -> f64 {
        self.user_features.sum()
    }

    pub fn item_feature_sum(&self) -> f64 {
        self.item_features.sum()
    }

    pub fn into_factors(self) -> (Array2<f64>, Array2<f64>) {
        (self.user_features, self.item_features)
    }
}

/// ParVecMF factorizer
pub struct ParVecMfFactorizer {
    config: FactorizerConfig,
}

impl ParVecMfFactorizer {
    /// Create a factorizer after validating its configuration
    pub fn new(config: FactorizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FactorizerConfig {
        &self.config
    }

    /// Factorize with embeddings that are already parsed and keyed by the
    /// dense indices of `IdMapping::from_source(source)`
    pub fn factorize_with_embeddings(
        &self,
        source: &dyn RatingSource,
        user_embeddings: &Embeddings,
        item_embeddings: &Embeddings,
    ) -> Result<Factorization> {
        let mapping = IdMapping::from_source(source)?;
        self.factorize_mapped(source, mapping, user_embeddings, item_embeddings)
    }

    fn factorize_mapped(
        &self,
        source: &dyn RatingSource,
        mapping: IdMapping,
        user_embeddings: &Embeddings,
        item_embeddings: &Embeddings,
    ) -> Result<Factorization> {
        let user_rows = RatingRows::for_users(source, &mapping)?;
        let item_rows = RatingRows::for_items(source, &mapping)?;

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut store = FeatureStore::new(
            mapping.num_users(),
            mapping.num_items(),
            self.config.num_features,
            user_embeddings,
            item_embeddings,
            &mut rng,
        )?;

        self.run(&mut store, &user_rows, &item_rows)?;

        let (user_features, item_features) = store.into_factors();
        Ok(Factorization::new(user_features, item_features, mapping))
    }

    /// Run the configured number of iterations on a caller-built store
    ///
    /// On error the store keeps the factors of the last completed phase.
    pub fn run(&self, store: &mut FeatureStore, user_rows: &RatingRows, item_rows: &RatingRows) -> Result<()> {
        check_rows("user rating rows", store.num_users(), user_rows)?;
        check_rows("item rating rows", store.num_items(), item_rows)?;

        info!(
            users = store.num_users(),
            items = store.num_items(),
            ratings = user_rows.num_ratings(),
            features = store.num_features(),
            iterations = self.config.num_iterations,
            threads = self.config.num_threads,
            "starting to compute the factorization"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .thread_name(|i| format!("parvecmf-worker-{}", i))
            .build()?;

        for iteration in 1..=self.config.num_iterations {
            info!("iteration {}", iteration);

            // fix V - compute U
            let started = Instant::now();
            let user_features = self
                .solve_phase(
                    &pool,
                    Phase::User,
                    user_rows,
                    store.user_embeddings(),
                    store.item_features(),
                    self.config.lambda_user,
                )
                .map_err(|e| {
                    error!(iteration, phase = %Phase::User, "phase aborted: {}", e);
                    e
                })?;
            store.replace_user_features(user_features)?;
            log_phase(iteration, Phase::User, started, user_rows, store);

            // fix U - compute V
            let started = Instant::now();
            let item_features = self
                .solve_phase(
                    &pool,
                    Phase::Item,
                    item_rows,
                    store.item_embeddings(),
                    store.user_features(),
                    self.config.lambda_item,
                )
                .map_err(|e| {
                    error!(iteration, phase = %Phase::Item, "phase aborted: {}", e);
                    e
                })?;
            store.replace_item_features(item_features)?;
            log_phase(iteration, Phase::Item, started, user_rows, store);
        }

        info!("finished computing the factorization");
        Ok(())
    }

    /// Solve every row of one side against the fixed opposite matrix
    ///
    /// Blocks until all rows are done. Any row failure or worker panic fails
    /// the whole phase.
    fn solve_phase(
        &self,
        pool: &ThreadPool,
        phase: Phase,
        rows: &RatingRows,
        anchors: ArrayView2<'_, f64>,
        opposite: ArrayView2<'_, f64>,
        lambda: f64,
    ) -> Result<Array2<f64>> {
        let confidence = self.config.confidence;
        let k = opposite.ncols();

        let inverse = regularized_inverse(opposite, confidence, lambda)?;
        let inverse = inverse.view();

        let mut next = Array2::<f64>::zeros((rows.len(), k));

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            pool.install(|| {
                next.axis_iter_mut(Axis(0))
                    .into_par_iter()
                    .enumerate()
                    .try_for_each(|(idx, mut target)| {
                        let theta =
                            solve_row(rows.row(idx), anchors.row(idx), opposite, inverse, lambda, confidence)?;
                        if let Some(pos) = theta.iter().position(|v| !v.is_finite()) {
                            debug!(%phase, row = idx, feature = pos, "non-finite factor");
                            return Err(ParVecMfError::NonFiniteFactors { phase, row: idx });
                        }
                        target.assign(&theta);
                        Ok(())
                    })
            })
        }));

        match outcome {
            Ok(result) => result?,
            Err(_) => return Err(ParVecMfError::WorkerPanicked { phase }),
        }

        Ok(next)
    }
}

impl Factorizer for ParVecMfFactorizer {
    /// Build the id mapping, load both embedding files and run
    fn factorize(&self, source: &dyn RatingSource) -> Result<Factorization> {
        let mapping = IdMapping::from_source(source)?;
        let k = self.config.num_features;

        let user_embeddings = load_embeddings(
            required_path(self.config.user_embeddings_path.as_deref(), "PARVECMF_USER_EMBEDDINGS")?,
            k,
            &mapping.users,
        )?;
        let item_embeddings = load_embeddings(
            required_path(self.config.item_embeddings_path.as_deref(), "PARVECMF_ITEM_EMBEDDINGS")?,
            k,
            &mapping.items,
        )?;

        self.factorize_mapped(source, mapping, &user_embeddings, &item_embeddings)
    }
}

fn required_path<'a>(path: Option<&'a Path>, key: &str) -> Result<&'a Path> {
    path.ok_or_else(|| ParVecMfError::config("embedding file path is not set", key))
}

fn check_rows(what: &'static str, expected: usize, rows: &RatingRows) -> Result<()> {
    if rows.len() != expected {
        return Err(ParVecMfError::DimensionMismatch {
            what,
            expected,
            found: rows.len(),
        });
    }
    Ok(())
}

fn log_phase(iteration: usize, phase: Phase, started: Instant, user_rows: &RatingRows, store: &FeatureStore) {
    debug!(
        iteration,
        %phase,
        elapsed_ms = started.elapsed().as_millis() as u64,
        mse = training_error(user_rows, store.user_features(), store.item_features()),
        "phase complete"
    );
}

/// Mean squared error over the observed ratings
fn training_error(user_rows: &RatingRows, users: ArrayView2<'_, f64>, items: ArrayView2<'_, f64>) -> f64 {
    let (sum, count) = user_rows
        .iter()
        .enumerate()
        .flat_map(|(u, row)| row.entries().iter().map(move |&(i, r)| (u, i, r)))
        .fold((0.0, 0usize), |(sum, count), (u, i, r)| {
            let err = r - users.row(u).dot(&items.row(i));
            (sum + err * err, count + 1)
        });

    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}
