//! Factorizer configuration
//!
//! Configuration is loaded from `PARVECMF_`-prefixed environment variables, with
//! defaults for everything except the two embedding file paths.
//!
//! # Environment Variables
//!
//! - `PARVECMF_NUM_FEATURES`: number of latent features k (default: 100)
//! - `PARVECMF_NUM_ITERATIONS`: number of alternating iterations N (default: 10)
//! - `PARVECMF_LAMBDA_USER`: λ<sub>u</sub> regularization weight (default: 0.1)
//! - `PARVECMF_LAMBDA_ITEM`: λ<sub>v</sub> regularization weight (default: 0.1)
//! - `PARVECMF_CONFIDENCE`: c confidence scale (default: 1.0)
//! - `PARVECMF_NUM_THREADS`: worker threads per phase (default: available parallelism)
//! - `PARVECMF_USER_EMBEDDINGS`: path of the user paragraph-vector file
//! - `PARVECMF_ITEM_EMBEDDINGS`: path of the item paragraph-vector file
//! - `PARVECMF_SEED`: seed for the item-factor initialization (default: unseeded)
//!
//! # Example
//!
//! ```no_run
//! use parvecmf::config::{load_dotenv, FactorizerConfig};
//!
//! # fn example() -> parvecmf::Result<()> {
//! load_dotenv();
//! let config = FactorizerConfig::from_env()?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ParVecMfError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ParVecMF hyperparameters and inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorizerConfig {
    /// Number of latent features (k)
    pub num_features: usize,
    /// Number of alternating iterations (N)
    pub num_iterations: usize,
    /// Regularization weight of the user phase (λ_u)
    pub lambda_user: f64,
    /// Regularization weight of the item phase (λ_v)
    pub lambda_item: f64,
    /// Confidence scale on the fit term (c)
    pub confidence: f64,
    /// Worker threads per phase (T)
    pub num_threads: usize,
    pub user_embeddings_path: Option<PathBuf>,
    pub item_embeddings_path: Option<PathBuf>,
    /// Seed for the item-factor initialization
    pub seed: Option<u64>,
}

impl Default for FactorizerConfig {
    fn default() -> Self {
        Self {
            num_features: 100,
            num_iterations: 10,
            lambda_user: 0.1,
            lambda_item: 0.1,
            confidence: 1.0,
            num_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            user_embeddings_path: None,
            item_embeddings_path: None,
            seed: None,
        }
    }
}

impl FactorizerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            num_features: parse_env_var("PARVECMF_NUM_FEATURES", defaults.num_features)?,
            num_iterations: parse_env_var("PARVECMF_NUM_ITERATIONS", defaults.num_iterations)?,
            lambda_user: parse_env_var("PARVECMF_LAMBDA_USER", defaults.lambda_user)?,
            lambda_item: parse_env_var("PARVECMF_LAMBDA_ITEM", defaults.lambda_item)?,
            confidence: parse_env_var("PARVECMF_CONFIDENCE", defaults.confidence)?,
            num_threads: parse_env_var("PARVECMF_NUM_THREADS", defaults.num_threads)?,
            user_embeddings_path: std::env::var_os("PARVECMF_USER_EMBEDDINGS").map(PathBuf::from),
            item_embeddings_path: std::env::var_os("PARVECMF_ITEM_EMBEDDINGS").map(PathBuf::from),
            seed: std::env::var("PARVECMF_SEED")
                .ok()
                .map(|v| {
                    v.parse::<u64>().map_err(|e| {
                        ParVecMfError::config(
                            format!("Failed to parse PARVECMF_SEED: {}", e),
                            "PARVECMF_SEED",
                        )
                    })
                })
                .transpose()?,
        })
    }

    /// Validate hyperparameters
    ///
    /// The embedding paths are not checked here; a missing path is reported when
    /// the factorizer tries to load it.
    pub fn validate(&self) -> Result<()> {
        if self.num_features == 0 {
            return Err(ParVecMfError::config(
                "num_features must be greater than 0",
                "PARVECMF_NUM_FEATURES",
            ));
        }

        if self.num_threads == 0 {
            return Err(ParVecMfError::config(
                "num_threads must be greater than 0",
                "PARVECMF_NUM_THREADS",
            ));
        }

        check_positive(self.lambda_user, "lambda_user", "PARVECMF_LAMBDA_USER")?;
        check_positive(self.lambda_item, "lambda_item", "PARVECMF_LAMBDA_ITEM")?;
        check_positive(self.confidence, "confidence", "PARVECMF_CONFIDENCE")?;

        Ok(())
    }
}

fn check_positive(value: f64, name: &str, key: &str) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ParVecMfError::config(
            format!("{} must be a finite value greater than 0, got {}", name, value),
            key,
        ));
    }
    Ok(())
}

/// Parse an environment variable, falling back to `default` when it is unset
fn parse_env_var<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>().map_err(|e| {
                ParVecMfError::config(format!("Failed to parse {}: {}", key, e), key)
            })
        })
        .unwrap_or(Ok(default))
}

/// Load .env file if present
///
/// A missing .env file is not an error.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = FactorizerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.num_threads >= 1);
    }

    #[test]
    fn test_zero_features_rejected() {
        let config = FactorizerConfig {
            num_features: 0,
            ..Default::default()
        };

        match config.validate() {
            Err(ParVecMfError::Configuration { key, .. }) => {
                assert_eq!(key.as_deref(), Some("PARVECMF_NUM_FEATURES"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_scalars_rejected() {
        let zero_lambda = FactorizerConfig {
            lambda_user: 0.0,
            ..Default::default()
        };
        assert!(zero_lambda.validate().is_err());

        let negative_lambda = FactorizerConfig {
            lambda_item: -0.5,
            ..Default::default()
        };
        assert!(negative_lambda.validate().is_err());

        let nan_confidence = FactorizerConfig {
            confidence: f64::NAN,
            ..Default::default()
        };
        assert!(nan_confidence.validate().is_err());

        let no_threads = FactorizerConfig {
            num_threads: 0,
            ..Default::default()
        };
        assert!(no_threads.validate().is_err());
    }

    #[test]
    fn test_parse_env_var_default_when_unset() {
        let value: usize = parse_env_var("PARVECMF_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_config_serializes_to_json() {
        let config = FactorizerConfig {
            num_features: 8,
            seed: Some(42),
            ..Default::default()
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["num_features"], 8);
        assert_eq!(json["seed"], 42);
    }
}
