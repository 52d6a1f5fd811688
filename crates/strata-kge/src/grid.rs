//! Grid search over model family, embedding dimension and negative samples.
//!
//! Every configuration is trained on the mapped training split and ranked on
//! the validation split, filtered by training triples. The configuration
//! with the highest validation MRR (earliest wins on ties) is then ranked
//! once more on the test split.
//!
//! Trials run strictly one after another. A failing trial aborts the run.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::evaluation::{Evaluator, RankMetrics, DEFAULT_EVAL_BATCH_SIZE};
use crate::model::{ModelTrainer, TrainingConfig};
use crate::scoring::ModelFamily;
use crate::vocab::MappedDataset;

/// Search space and shared training settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Model families, outermost loop (default: TransE, DistMult, ComplEx).
    pub families: Vec<ModelFamily>,
    /// Embedding dimensions (default: 50, 100).
    pub embedding_dims: Vec<usize>,
    /// Negative samples per positive, innermost loop (default: 5, 20).
    pub negative_samples: Vec<usize>,
    /// Training epochs per trial (default: 200).
    pub epochs: usize,
    /// Target number of batches per epoch; batch size is derived from it
    /// (default: 150).
    pub batches_per_epoch: usize,
    /// Candidates scored per model call during evaluation (default: 256).
    pub eval_batch_size: usize,
    pub learning_rate: f32,
    pub margin: f32,
    /// Seed for every trial's initialisation and sampling (default: 42).
    pub seed: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            families: ModelFamily::ALL.to_vec(),
            embedding_dims: vec![50, 100],
            negative_samples: vec![5, 20],
            epochs: 200,
            batches_per_epoch: 150,
            eval_batch_size: DEFAULT_EVAL_BATCH_SIZE,
            learning_rate: 0.01,
            margin: 1.0,
            seed: 42,
        }
    }
}

impl GridConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject empty axes and zero sizes.
    pub fn validate(&self) -> Result<()> {
        if self.families.is_empty() {
            return Err(Error::InvalidConfig("no model families".into()));
        }
        if self.embedding_dims.is_empty() || self.embedding_dims.contains(&0) {
            return Err(Error::InvalidConfig(
                "embedding dimensions must be a non-empty list of positive values".into(),
            ));
        }
        if self.negative_samples.is_empty() || self.negative_samples.contains(&0) {
            return Err(Error::InvalidConfig(
                "negative samples must be a non-empty list of positive values".into(),
            ));
        }
        if self.batches_per_epoch == 0 {
            return Err(Error::InvalidConfig("batches_per_epoch must be positive".into()));
        }
        if self.eval_batch_size == 0 {
            return Err(Error::InvalidConfig("eval_batch_size must be positive".into()));
        }
        Ok(())
    }

    /// All configurations in enumeration order: families, then dimensions,
    /// then negative samples.
    pub fn trials(&self) -> Vec<TrialConfig> {
        let mut trials = Vec::with_capacity(self.len());
        for &family in &self.families {
            for &dim in &self.embedding_dims {
                for &negs in &self.negative_samples {
                    trials.push(TrialConfig { family, dim, negs });
                }
            }
        }
        trials
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.families.len() * self.embedding_dims.len() * self.negative_samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Training batch size for a training split of `num_train` triples.
    pub fn batch_size(&self, num_train: usize) -> usize {
        (num_train / self.batches_per_epoch.max(1)).max(1)
    }

    /// Full training configuration for one trial.
    pub fn training_config(&self, trial: &TrialConfig, num_train: usize) -> TrainingConfig {
        TrainingConfig::default()
            .with_family(trial.family)
            .with_embedding_dim(trial.dim)
            .with_negative_samples(trial.negs)
            .with_epochs(self.epochs)
            .with_batch_size(self.batch_size(num_train))
            .with_learning_rate(self.learning_rate)
            .with_margin(self.margin)
            .with_seed(self.seed)
    }
}

/// One point of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrialConfig {
    pub family: ModelFamily,
    pub dim: usize,
    pub negs: usize,
}

impl fmt::Display for TrialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dim={} negs={}", self.family, self.dim, self.negs)
    }
}

/// One row of the result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub model: ModelFamily,
    pub dim: usize,
    pub negs: usize,
    /// Validation MRR.
    pub mrr: f64,
    /// Validation Hits@10.
    pub hits_at_10: f64,
}

impl TrialResult {
    pub fn new(config: TrialConfig, metrics: &RankMetrics) -> Self {
        Self {
            model: config.family,
            dim: config.dim,
            negs: config.negs,
            mrr: metrics.mrr,
            hits_at_10: metrics.hits_at_10,
        }
    }

    pub fn config(&self) -> TrialConfig {
        TrialConfig {
            family: self.model,
            dim: self.dim,
            negs: self.negs,
        }
    }
}

/// Index of the best result by MRR; the earliest of tied maxima wins.
pub fn select_best(results: &[TrialResult]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, r) in results.iter().enumerate() {
        match best {
            Some((_, mrr)) if r.mrr <= mrr => {}
            _ => best = Some((i, r.mrr)),
        }
    }
    best.map(|(i, _)| i)
}

/// Lifecycle of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Pending,
    Training,
    Evaluated,
}

/// Lifecycle of the whole search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Enumerating,
    Selecting,
    FinalEvaluating,
    Done,
}

/// Progress notifications emitted while the search runs.
#[derive(Debug, Clone)]
pub enum GridEvent<'a> {
    TrialStarted {
        index: usize,
        total: usize,
        config: TrialConfig,
    },
    TrialFinished {
        index: usize,
        total: usize,
        result: &'a TrialResult,
    },
    FinalEvaluation {
        config: TrialConfig,
    },
}

/// Out-of-vocabulary triples dropped from each split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DroppedCounts {
    pub train: usize,
    pub valid: usize,
    pub test: usize,
}

/// Everything a finished search produced.
#[derive(Debug)]
pub struct GridReport<M> {
    /// One row per configuration, in enumeration order.
    pub trials: Vec<TrialResult>,
    /// Index into `trials` of the best configuration.
    pub best_index: usize,
    /// Test-split metrics of the best model.
    pub test: RankMetrics,
    /// The best model itself.
    pub best_model: M,
    pub dropped: DroppedCounts,
}

impl<M> GridReport<M> {
    pub fn best(&self) -> &TrialResult {
        &self.trials[self.best_index]
    }

    /// Trials sorted by validation MRR, highest first. Ties keep enumeration
    /// order.
    pub fn ranked(&self) -> Vec<&TrialResult> {
        let mut rows: Vec<&TrialResult> = self.trials.iter().collect();
        rows.sort_by(|a, b| b.mrr.total_cmp(&a.mrr));
        rows
    }
}

/// Drives training and evaluation over a [`GridConfig`].
pub struct GridSearch<T> {
    trainer: T,
    config: GridConfig,
    state: ControllerState,
    trial_states: Vec<TrialState>,
}

impl<T: ModelTrainer> GridSearch<T> {
    pub fn new(trainer: T, config: GridConfig) -> Result<Self> {
        config.validate()?;
        let trial_states = vec![TrialState::Pending; config.len()];
        Ok(Self {
            trainer,
            config,
            state: ControllerState::Enumerating,
            trial_states,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn trial_states(&self) -> &[TrialState] {
        &self.trial_states
    }

    /// Run the search without progress reporting.
    pub fn run(&mut self, dataset: &MappedDataset) -> Result<GridReport<T::Model>> {
        self.run_with_progress(dataset, |_| {})
    }

    /// Run the search, calling `progress` as trials start and finish.
    ///
    /// Any training or evaluation error ends the run. The controller and
    /// trial states are left where the failure happened.
    pub fn run_with_progress<F>(
        &mut self,
        dataset: &MappedDataset,
        mut progress: F,
    ) -> Result<GridReport<T::Model>>
    where
        F: FnMut(GridEvent<'_>),
    {
        let trials = self.config.trials();
        let total = trials.len();
        self.state = ControllerState::Enumerating;
        self.trial_states = vec![TrialState::Pending; total];

        let num_entities = dataset.vocab.num_entities();
        let num_relations = dataset.vocab.num_relations();
        let evaluator = Evaluator::new()
            .with_filter(&dataset.train.triples)
            .with_batch_size(self.config.eval_batch_size);

        if dataset.valid.is_empty() {
            tracing::warn!("validation split is empty; every trial will score MRR 0");
        }
        tracing::info!(
            trials = total,
            batch_size = self.config.batch_size(dataset.train.len()),
            epochs = self.config.epochs,
            "starting grid search"
        );

        let mut results: Vec<TrialResult> = Vec::with_capacity(total);
        let mut best: Option<(f64, T::Model)> = None;

        for (index, trial) in trials.into_iter().enumerate() {
            progress(GridEvent::TrialStarted {
                index,
                total,
                config: trial,
            });
            self.trial_states[index] = TrialState::Training;
            tracing::info!(trial = index + 1, total, config = %trial, "training");

            let training = self.config.training_config(&trial, dataset.train.len());
            let model = self.trainer.train(
                &dataset.train.triples,
                num_entities,
                num_relations,
                &training,
            )?;
            let metrics = evaluator.evaluate(&model, &dataset.valid.triples)?;
            self.trial_states[index] = TrialState::Evaluated;

            let result = TrialResult::new(trial, &metrics);
            tracing::info!(
                config = %trial,
                mrr = result.mrr,
                hits_at_10 = result.hits_at_10,
                "trial finished"
            );

            let improves = match &best {
                Some((mrr, _)) => result.mrr > *mrr,
                None => true,
            };
            if improves {
                best = Some((result.mrr, model));
            }

            results.push(result);
            progress(GridEvent::TrialFinished {
                index,
                total,
                result: &results[index],
            });
        }

        self.state = ControllerState::Selecting;
        let (best_index, best_model) = match (select_best(&results), best) {
            (Some(index), Some((_, model))) => (index, model),
            _ => return Err(Error::InvalidConfig("grid produced no trials".into())),
        };
        let best_config = results[best_index].config();
        tracing::info!(config = %best_config, mrr = results[best_index].mrr, "best configuration");

        self.state = ControllerState::FinalEvaluating;
        progress(GridEvent::FinalEvaluation {
            config: best_config,
        });
        let test = evaluator.evaluate(&best_model, &dataset.test.triples)?;
        tracing::info!(mrr = test.mrr, hits_at_10 = test.hits_at_10, "test evaluation");

        self.state = ControllerState::Done;
        Ok(GridReport {
            trials: results,
            best_index,
            test,
            best_model,
            dropped: DroppedCounts {
                train: dataset.train.dropped,
                valid: dataset.valid.dropped,
                test: dataset.test.dropped,
            },
        })
    }
}
