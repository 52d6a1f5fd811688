use thiserror::Error;

/// Errors that can occur in strata-kge.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the triple layer (reading, partitioning).
    #[error(transparent)]
    Core(#[from] strata_core::Error),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Result table write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The training split holds no usable triple.
    #[error("Empty vocabulary: the training split contains no usable triples")]
    EmptyVocabulary,
    /// Model training failed.
    #[error("Training failed: {0}")]
    TrainingFailure(String),
    /// A model produced NaN or infinity while being ranked.
    #[error("Model produced a non-finite score ({score}) for ({head}, {relation}, {tail})")]
    NonFiniteScore {
        score: f32,
        head: usize,
        relation: usize,
        tail: usize,
    },
    /// A model returned the wrong number of scores for a batch.
    #[error("Model returned {actual} scores for a batch of {expected}")]
    ScoreCountMismatch { expected: usize, actual: usize },
    /// Invalid grid or training configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error means the model itself is unusable.
    ///
    /// Non-finite scores count as a training failure.
    pub fn is_training_failure(&self) -> bool {
        matches!(self, Self::TrainingFailure(_) | Self::NonFiniteScore { .. })
    }
}

/// Result type alias for strata-kge.
pub type Result<T> = std::result::Result<T, Error>;
