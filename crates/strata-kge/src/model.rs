//! Model capability traits.
//!
//! The evaluation harness and grid search only ever see these two traits.
//! Any embedding library can be plugged in by implementing them; the
//! built-in SGD models in [`crate::models`] are one implementation.
//!
//! ```rust,ignore
//! use strata_kge::{KgeModel, ModelTrainer, SgdTrainer, TrainingConfig};
//!
//! let model = SgdTrainer.train(&train, num_entities, num_relations, &config)?;
//! let scores = model.score_batch(&candidates)?;
//! ```

use crate::error::Result;
use crate::scoring::ModelFamily;
use crate::vocab::IdTriple;

/// A trained model that can score ID-mapped triples.
pub trait KgeModel {
    /// Score a batch of triples; higher = more plausible.
    ///
    /// Must return exactly one score per input triple, and the score of a
    /// triple must not depend on which batch it arrives in.
    fn score_batch(&self, triples: &[IdTriple]) -> Result<Vec<f32>>;

    /// Number of entity ids the model was built for.
    fn num_entities(&self) -> usize;

    /// Human-readable model name.
    fn name(&self) -> String;
}

impl<M: KgeModel + ?Sized> KgeModel for Box<M> {
    fn score_batch(&self, triples: &[IdTriple]) -> Result<Vec<f32>> {
        (**self).score_batch(triples)
    }

    fn num_entities(&self) -> usize {
        (**self).num_entities()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// Something that fits a [`KgeModel`] to training triples.
///
/// Treated as a synchronous, deterministic-given-seed call. Errors should be
/// reported as [`Error::TrainingFailure`](crate::Error::TrainingFailure).
pub trait ModelTrainer {
    type Model: KgeModel;

    fn train(
        &self,
        triples: &[IdTriple],
        num_entities: usize,
        num_relations: usize,
        config: &TrainingConfig,
    ) -> Result<Self::Model>;
}

/// Training configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Model family (default: TransE).
    pub family: ModelFamily,
    /// Embedding dimension (default: 100).
    pub embedding_dim: usize,
    /// Negative samples per positive (default: 5).
    pub negative_samples: usize,
    /// Number of training epochs (default: 100).
    pub epochs: usize,
    /// Batch size (default: 512).
    pub batch_size: usize,
    /// Learning rate (default: 0.01).
    pub learning_rate: f32,
    /// Margin for ranking loss (default: 1.0).
    pub margin: f32,
    /// L2 weight on touched embeddings (default: 0.0).
    pub regularization: f32,
    /// Random seed for initialisation and negative sampling (default: 0).
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            family: ModelFamily::TransE,
            embedding_dim: 100,
            negative_samples: 5,
            epochs: 100,
            batch_size: 512,
            learning_rate: 0.01,
            margin: 1.0,
            regularization: 0.0,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    pub fn with_family(mut self, family: ModelFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    pub fn with_negative_samples(mut self, n: usize) -> Self {
        self.negative_samples = n;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_regularization(mut self, weight: f32) -> Self {
        self.regularization = weight;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
