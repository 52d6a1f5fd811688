#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::uninlined_format_args)]

//! Triple sets and stratified partitioning for link-prediction datasets.
//!
//! Link prediction is evaluated by hiding facts from a model and asking it to
//! recover them. Before any model sees the graph, the triples are split into
//! train, validation and test sets:
//!
//! ```text
//!  all triples ──stratified 80/20──> train
//!                                └─> rest ──stratified 50/50──> valid
//!                                                            └─> test
//! ```
//!
//! Each split should contain every relation type in about the same share as
//! the whole graph. Relations that occur only once or twice cannot be spread
//! over three sets on their own, so they are pooled into a `rare` stratum
//! (see [`partition`](mod@partition)).
//!
//! - [`Triple`] - an opaque (head, relation, tail) fact
//! - [`TripleStore`] - an ordered collection of triples
//! - [`RelationFrequency`] - per-relation counts over a triple set
//! - [`formats::Tsv`] - headerless tab-separated triple files
//! - [`partition::partition`] - the seeded stratified splitter
//!
//! # Example
//!
//! ```rust
//! use strata_core::{partition, SplitConfig, Triple, TripleStore};
//!
//! let store: TripleStore = (0..20)
//!     .map(|i| Triple::new(format!("e{}", i), "knows", format!("e{}", i + 1)))
//!     .collect();
//!
//! let split = partition(&store, &SplitConfig::default()).unwrap();
//! assert_eq!(split.train.len(), 16);
//! assert_eq!(split.valid.len() + split.test.len(), 4);
//! ```

mod error;
pub mod formats;
pub mod partition;
mod store;
mod triple;

pub use error::{Error, Result};
pub use partition::{partition, SplitConfig, Split, StratumKey};
pub use store::{RelationFrequency, TripleStore};
pub use triple::Triple;
