//! ParVecMF: Paragraph Vector-based Matrix Factorization
//!
//! Alternating least squares factorization of a user-item rating matrix where
//! every user and item factor is regularized toward an externally trained
//! paragraph-vector embedding instead of toward zero. Blends collaborative
//! signal from ratings with content signal from review or description text.

pub mod config;
pub mod data_model;
pub mod embeddings;
pub mod error;
pub mod factorizer;
pub mod features;
pub mod id_mapping;
pub mod normal_equation;
pub mod solver;

// Re-export key types
pub use config::{load_dotenv, FactorizerConfig};
pub use data_model::{InMemoryRatings, RatingRows, RatingSource, SparseRow};
pub use embeddings::{load_embeddings, parse_embeddings, Embeddings};
pub use error::{ParVecMfError, Result};
pub use factorizer::{Factorization, Factorizer, ParVecMfFactorizer, Phase};
pub use features::FeatureStore;
pub use id_mapping::{IdIndex, IdMapping};
pub use normal_equation::regularized_inverse;
pub use solver::solve_row;
