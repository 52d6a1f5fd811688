//! File formats for triple sets.

mod tsv;

pub use tsv::Tsv;
