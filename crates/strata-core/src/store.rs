//! In-memory triple collection and relation frequency table.

use crate::Triple;
use std::collections::{BTreeMap, BTreeSet};

/// An ordered, in-memory collection of triples.
///
/// Duplicates are kept. Order follows insertion but carries no meaning
/// beyond reproducibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleStore {
    triples: Vec<Triple>,
}

impl TripleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple.
    pub fn push(&mut self, triple: Triple) {
        self.triples.push(triple);
    }

    /// Number of triples (duplicates counted).
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Whether the store holds no triples.
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Iterate triples in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Triple> {
        self.triples.iter()
    }

    /// Borrow the triples as a slice.
    pub fn as_slice(&self) -> &[Triple] {
        &self.triples
    }

    /// Consume the store, returning its triples.
    pub fn into_inner(self) -> Vec<Triple> {
        self.triples
    }

    /// Count of triples per relation.
    pub fn relation_frequencies(&self) -> RelationFrequency {
        RelationFrequency::from_triples(&self.triples)
    }

    /// Number of distinct head/tail strings.
    pub fn entity_count(&self) -> usize {
        self.triples
            .iter()
            .flat_map(|t| [t.head.as_str(), t.tail.as_str()])
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Drop triples whose tail is a literal longer than `max_len` characters.
    ///
    /// Returns how many triples were removed.
    pub fn drop_long_literals(&mut self, max_len: usize) -> usize {
        let before = self.triples.len();
        self.triples
            .retain(|t| !(t.tail_is_literal() && t.tail.chars().count() > max_len));
        before - self.triples.len()
    }
}

impl From<Vec<Triple>> for TripleStore {
    fn from(triples: Vec<Triple>) -> Self {
        Self { triples }
    }
}

impl FromIterator<Triple> for TripleStore {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TripleStore {
    type Item = Triple;
    type IntoIter = std::vec::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}

impl<'a> IntoIterator for &'a TripleStore {
    type Item = &'a Triple;
    type IntoIter = std::slice::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}

/// Relation -> number of triples using it, over one triple set.
///
/// Iteration is in relation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationFrequency {
    counts: BTreeMap<String, usize>,
}

impl RelationFrequency {
    /// Count relations over a slice of triples.
    pub fn from_triples(triples: &[Triple]) -> Self {
        let mut counts = BTreeMap::new();
        for t in triples {
            *counts.entry(t.relation.clone()).or_insert(0) += 1;
        }
        Self { counts }
    }

    /// Count for a relation (0 if absent).
    pub fn count(&self, relation: &str) -> usize {
        self.counts.get(relation).copied().unwrap_or(0)
    }

    /// Number of distinct relations.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no relation was counted.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate (relation, count) pairs in relation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(r, &c)| (r.as_str(), c))
    }

    /// Relations with fewer than `min_count` uses.
    pub fn below(&self, min_count: usize) -> Vec<String> {
        self.counts
            .iter()
            .filter(|(_, &c)| c < min_count)
            .map(|(r, _)| r.clone())
            .collect()
    }
}
