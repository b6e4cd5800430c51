use crate::factorizer::Phase;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ParVecMfError>;

#[derive(Debug, thiserror::Error)]
pub enum ParVecMfError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source_name}:{line}: expected an id followed by {expected} values, found {found}")]
    EmbeddingTokenCount {
        source_name: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{source_name}:{line}: invalid embedding value '{token}'")]
    EmbeddingValue {
        source_name: String,
        line: usize,
        token: String,
    },

    #[error("{source_name}:{line}: unknown id '{id}'")]
    UnknownEmbeddingId {
        source_name: String,
        line: usize,
        id: String,
    },

    #[error("{source_name}:{line}: duplicate embedding for id '{id}'")]
    DuplicateEmbeddingId {
        source_name: String,
        line: usize,
        id: String,
    },

    #[error("{source_name}:{line}: malformed rating line: {reason}")]
    RatingLine {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error("Rating source error: {0}")]
    RatingSource(String),

    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("Unknown {kind} id '{id}'")]
    UnknownId { kind: &'static str, id: String },

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Normal-equation matrix is singular or not positive definite (pivot {pivot})")]
    SingularMatrix { pivot: usize },

    #[error("Non-finite factor in {phase} phase at row {row}")]
    NonFiniteFactors { phase: Phase, row: usize },

    #[error("Worker panicked during {phase} phase")]
    WorkerPanicked { phase: Phase },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        key: Option<String>,
    },
}

impl ParVecMfError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Self::Configuration {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for ParVecMfError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(err.to_string())
    }
}
