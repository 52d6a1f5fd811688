//! Training-only vocabulary and ID mapping.
//!
//! Models only know entities and relations they were trained on. The
//! vocabulary is built from the training split alone; any validation or test
//! triple that mentions something outside it is dropped from that split and
//! counted, so the loss stays visible next to the metrics.

use crate::error::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use strata_core::{Split, Triple};

/// A triple of dense vocabulary ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdTriple {
    pub head: usize,
    pub relation: usize,
    pub tail: usize,
}

impl IdTriple {
    pub fn new(head: usize, relation: usize, tail: usize) -> Self {
        Self {
            head,
            relation,
            tail,
        }
    }

    /// Same head and relation, different tail.
    pub fn with_tail(self, tail: usize) -> Self {
        Self { tail, ..self }
    }

    /// Same relation and tail, different head.
    pub fn with_head(self, head: usize) -> Self {
        Self { head, ..self }
    }
}

/// Dense, zero-based ids for entities and relations seen in training.
///
/// Ids follow the sorted order of the distinct strings, so the same training
/// set always yields the same mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    entities: Vec<String>,
    relations: Vec<String>,
    entity_index: HashMap<String, usize>,
    relation_index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build from training triples.
    ///
    /// Empty head/tail strings are treated as missing values and never get an
    /// id. Fails with [`Error::EmptyVocabulary`] when nothing usable remains.
    pub fn from_training(train: &[Triple]) -> Result<Self> {
        let mut entities = BTreeSet::new();
        let mut relations = BTreeSet::new();
        for t in train {
            for e in [&t.head, &t.tail] {
                if !e.is_empty() {
                    entities.insert(e.as_str());
                }
            }
            relations.insert(t.relation.as_str());
        }

        if entities.is_empty() || relations.is_empty() {
            return Err(Error::EmptyVocabulary);
        }

        let entities: Vec<String> = entities.into_iter().map(str::to_string).collect();
        let relations: Vec<String> = relations.into_iter().map(str::to_string).collect();
        let entity_index = index_of(&entities);
        let relation_index = index_of(&relations);

        Ok(Self {
            entities,
            relations,
            entity_index,
            relation_index,
        })
    }

    pub fn entity_id(&self, entity: &str) -> Option<usize> {
        self.entity_index.get(entity).copied()
    }

    pub fn relation_id(&self, relation: &str) -> Option<usize> {
        self.relation_index.get(relation).copied()
    }

    pub fn entity(&self, id: usize) -> Option<&str> {
        self.entities.get(id).map(String::as_str)
    }

    pub fn relation(&self, id: usize) -> Option<&str> {
        self.relations.get(id).map(String::as_str)
    }

    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn num_relations(&self) -> usize {
        self.relations.len()
    }

    /// Map one triple, or `None` if any part is out of vocabulary.
    pub fn map_triple(&self, triple: &Triple) -> Option<IdTriple> {
        Some(IdTriple {
            head: self.entity_id(&triple.head)?,
            relation: self.relation_id(&triple.relation)?,
            tail: self.entity_id(&triple.tail)?,
        })
    }

    /// Map a triple set, dropping and counting out-of-vocabulary triples.
    pub fn map(&self, triples: &[Triple]) -> MappedSplit {
        let mut mapped = Vec::with_capacity(triples.len());
        let mut dropped = 0;
        for t in triples {
            match self.map_triple(t) {
                Some(id) => mapped.push(id),
                None => dropped += 1,
            }
        }
        MappedSplit {
            triples: mapped,
            dropped,
        }
    }
}

fn index_of(items: &[String]) -> HashMap<String, usize> {
    items
        .iter()
        .enumerate()
        .map(|(i, s)| (s.clone(), i))
        .collect()
}

/// An ID-mapped split plus the number of triples dropped as out of
/// vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedSplit {
    pub triples: Vec<IdTriple>,
    pub dropped: usize,
}

impl MappedSplit {
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

/// Vocabulary plus the three ID-mapped splits, shared read-only by every
/// grid trial.
#[derive(Debug, Clone)]
pub struct MappedDataset {
    pub vocab: Vocabulary,
    pub train: MappedSplit,
    pub valid: MappedSplit,
    pub test: MappedSplit,
}

impl MappedDataset {
    /// Build the vocabulary from `train` and map all three splits with it.
    pub fn new(train: &[Triple], valid: &[Triple], test: &[Triple]) -> Result<Self> {
        let vocab = Vocabulary::from_training(train)?;
        let dataset = Self {
            train: vocab.map(train),
            valid: vocab.map(valid),
            test: vocab.map(test),
            vocab,
        };

        tracing::info!(
            entities = dataset.vocab.num_entities(),
            relations = dataset.vocab.num_relations(),
            train = dataset.train.len(),
            valid = dataset.valid.len(),
            test = dataset.test.len(),
            "built vocabulary"
        );
        for (name, split) in [
            ("train", &dataset.train),
            ("valid", &dataset.valid),
            ("test", &dataset.test),
        ] {
            if split.dropped > 0 {
                tracing::warn!(
                    split = name,
                    dropped = split.dropped,
                    "dropped out-of-vocabulary triples"
                );
            }
        }

        Ok(dataset)
    }

    /// Map a partition produced by [`strata_core::partition`].
    pub fn from_split(split: &Split) -> Result<Self> {
        Self::new(
            split.train.as_slice(),
            split.valid.as_slice(),
            split.test.as_slice(),
        )
    }
}
