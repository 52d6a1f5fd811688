//! Built-in embedding models.
//!
//! | Family | Score | Stored width |
//! |--------|-------|--------------|
//! | TransE | -\|\|h + r - t\|\| | `dim` |
//! | DistMult | <h, r, t> | `dim` |
//! | ComplEx | Re(<h, r, conj(t)>) | `2 * dim` |
//!
//! All three train with the same loop: pairwise margin loss, negatives
//! drawn by corrupting the head or tail, mini-batch SGD.

mod embedding;

pub use embedding::{EmbeddingModel, SgdTrainer};
