#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::uninlined_format_args)]

//! Benchmarking knowledge graph embeddings on a partitioned dataset.
//!
//! Given the train/valid/test split from `strata-core`, this crate
//!
//! 1. builds a [`Vocabulary`] from the training split only and maps every
//!    split to dense ids, dropping and counting out-of-vocabulary triples,
//! 2. trains one model per point of a [`GridConfig`] through the
//!    [`ModelTrainer`] trait,
//! 3. ranks each model on the validation split with the filtered protocol
//!    of [`Evaluator`],
//! 4. ranks the best one on the test split.
//!
//! ```text
//!  Split ──> MappedDataset ──> for each trial: train ─> rank(valid)
//!                                                         │
//!                                   best by MRR <─────────┘
//!                                        │
//!                                        └──> rank(test)
//! ```
//!
//! ## Model Families
//!
//! | Model | Hypothesis | Score |
//! |-------|------------|-------|
//! | TransE | Relations are translations | -\|\|h + r - t\|\| |
//! | DistMult | Relations are scalings | <h, r, t> |
//! | ComplEx | Asymmetric relations | Re(<h, r, conj(t)>) |
//!
//! The built-in [`SgdTrainer`] fits all three. Anything else that
//! implements [`ModelTrainer`] and [`KgeModel`] can be benchmarked the same
//! way; the evaluator and the grid never look inside a model.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use strata_core::{partition, SplitConfig};
//! use strata_kge::{GridConfig, GridSearch, MappedDataset, SgdTrainer};
//!
//! let split = partition(&store, &SplitConfig::default())?;
//! let data = MappedDataset::from_split(&split)?;
//! let report = GridSearch::new(SgdTrainer, GridConfig::default())?.run(&data)?;
//! println!("{}", report.test.summary());
//! ```

pub mod error;
pub mod evaluation;
pub mod grid;
pub mod model;
pub mod models;
pub mod report;
pub mod scoring;
pub mod vocab;

pub use error::{Error, Result};
pub use evaluation::{hits_at_k, mean_reciprocal_rank, Evaluator, RankMetrics, RankRecord};
pub use grid::{
    select_best, ControllerState, GridConfig, GridEvent, GridReport, GridSearch, TrialConfig,
    TrialResult, TrialState,
};
pub use model::{KgeModel, ModelTrainer, TrainingConfig};
pub use models::{EmbeddingModel, SgdTrainer};
pub use scoring::ModelFamily;
pub use vocab::{IdTriple, MappedDataset, MappedSplit, Vocabulary};
