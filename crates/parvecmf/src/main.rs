//! ParVecMF command line
//!
//! Factorizes a ratings file against user and item paragraph-vector files and
//! prints a JSON summary of the run.

use anyhow::{Context, Result};
use clap::Parser;
use parvecmf::{load_dotenv, Factorizer, FactorizerConfig, InMemoryRatings, ParVecMfFactorizer};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "parvecmf")]
#[command(about = "Paragraph vector-based matrix factorization", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(help = "Ratings file with user,item,rating lines")]
    ratings: PathBuf,

    #[arg(long, env = "PARVECMF_USER_EMBEDDINGS", help = "User paragraph-vector file")]
    user_embeddings: Option<PathBuf>,

    #[arg(long, env = "PARVECMF_ITEM_EMBEDDINGS", help = "Item paragraph-vector file")]
    item_embeddings: Option<PathBuf>,

    #[arg(short = 'k', long, help = "Number of latent features")]
    features: Option<usize>,

    #[arg(short = 'n', long, help = "Number of iterations")]
    iterations: Option<usize>,

    #[arg(long, help = "Regularization weight of the user phase")]
    lambda_user: Option<f64>,

    #[arg(long, help = "Regularization weight of the item phase")]
    lambda_item: Option<f64>,

    #[arg(short = 'c', long, help = "Confidence scale of the fit term")]
    confidence: Option<f64>,

    #[arg(short = 't', long, help = "Worker threads per phase")]
    threads: Option<usize>,

    #[arg(long, help = "Seed for the item-factor initialization")]
    seed: Option<u64>,

    #[arg(
        long,
        num_args = 2,
        value_names = ["USER", "ITEM"],
        help = "Also print the estimated rating of USER for ITEM"
    )]
    estimate: Option<Vec<String>>,

    #[arg(long, help = "Emit logs as JSON")]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, mut config: FactorizerConfig) -> FactorizerConfig {
        if let Some(path) = &self.user_embeddings {
            config.user_embeddings_path = Some(path.clone());
        }
        if let Some(path) = &self.item_embeddings {
            config.item_embeddings_path = Some(path.clone());
        }
        if let Some(k) = self.features {
            config.num_features = k;
        }
        if let Some(n) = self.iterations {
            config.num_iterations = n;
        }
        if let Some(lambda) = self.lambda_user {
            config.lambda_user = lambda;
        }
        if let Some(lambda) = self.lambda_item {
            config.lambda_item = lambda;
        }
        if let Some(c) = self.confidence {
            config.confidence = c;
        }
        if let Some(t) = self.threads {
            config.num_threads = t;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn run() -> Result<()> {
    load_dotenv();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = cli.apply(FactorizerConfig::from_env().context("Failed to read configuration")?);
    let factorizer = ParVecMfFactorizer::new(config).context("Invalid configuration")?;

    let ratings = InMemoryRatings::from_file(&cli.ratings)
        .with_context(|| format!("Failed to load ratings from {}", cli.ratings.display()))?;
    info!(
        users = ratings.num_users(),
        items = ratings.num_items(),
        ratings = ratings.num_ratings(),
        "loaded ratings"
    );

    let factorization = factorizer
        .factorize(&ratings)
        .context("Factorization failed")?;

    let mut summary = serde_json::json!({
        "users": factorization.user_features().nrows(),
        "items": factorization.item_features().nrows(),
        "features": factorization.num_features(),
        "iterations": factorizer.config().num_iterations,
        "user_feature_sum": factorization.user_feature_sum(),
        "item_feature_sum": factorization.item_feature_sum(),
    });

    if let Some(pair) = &cli.estimate {
        let estimate = factorization
            .estimate(&pair[0], &pair[1])
            .context("Failed to estimate rating")?;
        summary["estimate"] = serde_json::json!({
            "user": pair[0],
            "item": pair[1],
            "rating": estimate,
        });
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
