//! Stratified train/valid/test partitioning.
//!
//! Link-prediction benchmarks need every relation type represented in each
//! split in roughly the same proportion as in the full graph. A plain
//! stratified sampler cannot do that when some relations occur once or
//! twice, so low-frequency relations are pooled into a shared `rare`
//! stratum before sampling.
//!
//! # Algorithm
//!
//! 1. Count relations over the input.
//! 2. Key each triple by its relation if that relation occurs at least
//!    `min_count` times, otherwise by [`StratumKey::Rare`].
//! 3. Split off the held-out share (valid + test), sampling each stratum in
//!    proportion.
//! 4. Recount relations over the held-out share alone and re-key it; rare
//!    membership is local to each stage.
//! 5. Split the held-out share into valid and test the same way.
//!
//! Each stage is a two-way split, so every stratum must hold at least two
//! triples. Relation strata below that size join `rare`; a `rare` stratum
//! still below it is merged into the smallest relation stratum. When no
//! stratum can reach two members the stage fails with
//! [`Error::PartitionInfeasible`].
//!
//! Sampling is seeded (`XorShiftRng`), quotas are apportioned by largest
//! remainder, and outputs keep input order, so the same input and seed
//! always produce the same three files.

use crate::{Error, RelationFrequency, Result, Triple, TripleStore};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use std::collections::BTreeMap;
use std::fmt;

/// Partitions produced by one two-way stage.
const STAGE_PARTS: usize = 2;

/// Stratification key of a triple.
///
/// `Rare` sorts after every relation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StratumKey<'a> {
    /// A relation frequent enough to be its own stratum.
    Relation(&'a str),
    /// Shared bucket for low-frequency relations.
    Rare,
}

impl fmt::Display for StratumKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relation(r) => f.write_str(r),
            Self::Rare => f.write_str("rare"),
        }
    }
}

/// Split configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    /// Share of the input kept for training (default: 0.8).
    pub train_fraction: f64,
    /// Share of the remainder that becomes validation; the rest is test
    /// (default: 0.5).
    pub valid_fraction_of_rest: f64,
    /// Minimum relation frequency to stratify on the relation itself
    /// (default: 3).
    pub min_count: usize,
    /// Sampling seed (default: 42).
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            valid_fraction_of_rest: 0.5,
            min_count: 3,
            seed: 42,
        }
    }
}

impl SplitConfig {
    /// Build from a `train/valid/test` ratio such as `80/10/10`.
    pub fn from_ratio(train: f64, valid: f64, test: f64) -> Result<Self> {
        let total = train + valid + test;
        let rest = valid + test;
        if !(total > 0.0) || train < 0.0 || valid < 0.0 || test < 0.0 || !(rest > 0.0) {
            return Err(Error::InvalidRatio(format!(
                "{}/{}/{} is not a usable train/valid/test ratio",
                train, valid, test
            )));
        }
        let config = Self {
            train_fraction: train / total,
            valid_fraction_of_rest: valid / rest,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_train_fraction(mut self, fraction: f64) -> Self {
        self.train_fraction = fraction;
        self
    }

    pub fn with_valid_fraction_of_rest(mut self, fraction: f64) -> Self {
        self.valid_fraction_of_rest = fraction;
        self
    }

    /// Check both fractions lie strictly inside (0, 1).
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("train_fraction", self.train_fraction),
            ("valid_fraction_of_rest", self.valid_fraction_of_rest),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(Error::InvalidRatio(format!(
                    "{} must be in (0, 1), got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of one two-way stratified stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSplit {
    /// Triples kept on the first side.
    pub kept: Vec<Triple>,
    /// Triples moved to the held-out side.
    pub held_out: Vec<Triple>,
    /// Relations pooled into `rare` during this stage.
    pub rare_relations: Vec<String>,
}

/// Train/valid/test partition of a triple set.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: TripleStore,
    pub valid: TripleStore,
    pub test: TripleStore,
    /// Relations pooled into `rare` when splitting train from the rest.
    pub rare_first_stage: Vec<String>,
    /// Relations pooled into `rare` when splitting valid from test.
    pub rare_second_stage: Vec<String>,
}

impl Split {
    /// Total triples across the three sets.
    pub fn total(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }
}

/// Stratification key per triple, in input order.
///
/// A triple is keyed by its relation when that relation occurs at least
/// `min_count` times in `triples`, otherwise by [`StratumKey::Rare`].
pub fn stratification_keys(triples: &[Triple], min_count: usize) -> Vec<StratumKey<'_>> {
    let freq = RelationFrequency::from_triples(triples);
    triples
        .iter()
        .map(|t| {
            if freq.count(&t.relation) >= min_count {
                StratumKey::Relation(t.relation.as_str())
            } else {
                StratumKey::Rare
            }
        })
        .collect()
}

/// Partition a triple store into train, valid and test sets.
///
/// Every input triple lands in exactly one output. Nothing is returned on
/// failure.
pub fn partition(store: &TripleStore, config: &SplitConfig) -> Result<Split> {
    config.validate()?;

    let first = stratified_split(
        store.as_slice(),
        1.0 - config.train_fraction,
        config.min_count,
        config.seed,
    )?;
    let second = stratified_split(
        &first.held_out,
        1.0 - config.valid_fraction_of_rest,
        config.min_count,
        config.seed,
    )?;

    let split = Split {
        train: first.kept.into(),
        valid: second.kept.into(),
        test: second.held_out.into(),
        rare_first_stage: first.rare_relations,
        rare_second_stage: second.rare_relations,
    };

    tracing::info!(
        total = store.len(),
        train = split.train.len(),
        valid = split.valid.len(),
        test = split.test.len(),
        "partitioned triples"
    );

    Ok(split)
}

/// One stratified two-way split.
///
/// `held_out_fraction` of the triples (rounded up) move to the held-out
/// side; the rest are kept.
pub fn stratified_split(
    triples: &[Triple],
    held_out_fraction: f64,
    min_count: usize,
    seed: u64,
) -> Result<StageSplit> {
    let n = triples.len();
    let keys = stratification_keys(triples, min_count);
    let strata = build_strata(&keys)?;

    let held = held_out_count(n, held_out_fraction);
    if held == 0 || held >= n {
        return Err(Error::PartitionInfeasible {
            stratum: "*".to_string(),
            members: n,
            required: STAGE_PARTS,
        });
    }

    let quotas = apportion(&strata, held, n);
    let mut rng = XorShiftRng::seed_from_u64(seed);
    let mut is_held = vec![false; n];

    for ((key, members), quota) in strata.iter().zip(&quotas) {
        let mut shuffled = members.clone();
        shuffled.shuffle(&mut rng);
        for &i in &shuffled[..*quota] {
            is_held[i] = true;
        }
        tracing::debug!(
            stratum = %key,
            members = members.len(),
            held_out = quota,
            "allocated stratum"
        );
    }

    let mut kept = Vec::with_capacity(n - held);
    let mut held_out = Vec::with_capacity(held);
    for (triple, moved) in triples.iter().zip(is_held) {
        if moved {
            held_out.push(triple.clone());
        } else {
            kept.push(triple.clone());
        }
    }

    let mut rare_relations: Vec<String> = triples
        .iter()
        .zip(&keys)
        .filter(|(_, k)| **k == StratumKey::Rare)
        .map(|(t, _)| t.relation.clone())
        .collect();
    rare_relations.sort();
    rare_relations.dedup();

    Ok(StageSplit {
        kept,
        held_out,
        rare_relations,
    })
}

/// Group triple indices by stratum, folding undersized strata.
fn build_strata<'a>(keys: &[StratumKey<'a>]) -> Result<Vec<(StratumKey<'a>, Vec<usize>)>> {
    let mut grouped: BTreeMap<StratumKey<'a>, Vec<usize>> = BTreeMap::new();
    for (i, &key) in keys.iter().enumerate() {
        grouped.entry(key).or_default().push(i);
    }

    // Relation strata too small for a two-way split join `rare`.
    let undersized: Vec<StratumKey<'a>> = grouped
        .iter()
        .filter(|(k, v)| **k != StratumKey::Rare && v.len() < STAGE_PARTS)
        .map(|(k, _)| *k)
        .collect();
    for key in undersized {
        if let Some(members) = grouped.remove(&key) {
            grouped.entry(StratumKey::Rare).or_default().extend(members);
        }
    }

    if let Some(rare_len) = grouped.get(&StratumKey::Rare).map(Vec::len) {
        if rare_len < STAGE_PARTS {
            let target = grouped
                .iter()
                .filter(|(k, _)| **k != StratumKey::Rare)
                .min_by_key(|(_, v)| v.len())
                .map(|(k, _)| *k);
            let Some(target) = target else {
                return Err(Error::PartitionInfeasible {
                    stratum: StratumKey::Rare.to_string(),
                    members: rare_len,
                    required: STAGE_PARTS,
                });
            };
            if let Some(rare) = grouped.remove(&StratumKey::Rare) {
                if let Some(members) = grouped.get_mut(&target) {
                    members.extend(rare);
                    members.sort_unstable();
                }
            }
        }
    }

    if grouped.is_empty() {
        return Err(Error::PartitionInfeasible {
            stratum: "*".to_string(),
            members: 0,
            required: STAGE_PARTS,
        });
    }

    Ok(grouped.into_iter().collect())
}

/// `ceil(n * fraction)`, tolerant of floating-point noise in the fraction.
fn held_out_count(n: usize, fraction: f64) -> usize {
    let exact = n as f64 * fraction;
    let nearest = exact.round();
    if (exact - nearest).abs() < 1e-9 {
        nearest as usize
    } else {
        exact.ceil() as usize
    }
}

/// Largest-remainder apportionment of `held` slots over strata.
///
/// Ties in the remainder go to the earlier stratum key.
fn apportion(strata: &[(StratumKey<'_>, Vec<usize>)], held: usize, n: usize) -> Vec<usize> {
    let mut quotas: Vec<usize> = strata.iter().map(|(_, m)| m.len() * held / n).collect();
    let assigned: usize = quotas.iter().sum();

    let mut by_remainder: Vec<usize> = (0..strata.len()).collect();
    by_remainder.sort_by_key(|&i| std::cmp::Reverse(strata[i].1.len() * held % n));

    for &i in by_remainder.iter().take(held - assigned) {
        quotas[i] += 1;
    }
    quotas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triples(counts: &[(&str, usize)]) -> Vec<Triple> {
        let mut out = Vec::new();
        for (rel, count) in counts {
            for i in 0..*count {
                out.push(Triple::new(format!("h{}_{}", rel, i), *rel, format!("t{}", i)));
            }
        }
        out
    }

    #[test]
    fn test_keys_collapse_rare_relations() {
        let ts = triples(&[("a", 3), ("b", 1)]);
        let keys = stratification_keys(&ts, 3);
        assert_eq!(keys[0], StratumKey::Relation("a"));
        assert_eq!(keys[3], StratumKey::Rare);
    }

    #[test]
    fn test_rare_key_does_not_collide_with_relation_named_rare() {
        let ts = triples(&[("rare", 4), ("x", 1)]);
        let keys = stratification_keys(&ts, 2);
        assert_eq!(keys[0], StratumKey::Relation("rare"));
        assert_eq!(keys[4], StratumKey::Rare);
    }

    #[test]
    fn test_held_out_count() {
        assert_eq!(held_out_count(10, 1.0 - 0.8), 2);
        assert_eq!(held_out_count(10, 0.3), 3);
        assert_eq!(held_out_count(7, 0.5), 4);
        assert_eq!(held_out_count(1, 0.2), 1);
    }

    #[test]
    fn test_apportion_largest_remainder() {
        let strata = vec![
            (StratumKey::Relation("a"), vec![0; 5]),
            (StratumKey::Relation("b"), vec![0; 4]),
            (StratumKey::Rare, vec![0; 1]),
        ];
        // exact: 1.0, 0.8, 0.2
        assert_eq!(apportion(&strata, 2, 10), vec![1, 1, 0]);
    }

    #[test]
    fn test_proportions_preserved() {
        let ts = triples(&[("a", 50), ("b", 30), ("c", 20)]);
        let stage = stratified_split(&ts, 0.2, 3, 7).unwrap();
        let freq = RelationFrequency::from_triples(&stage.held_out);
        assert_eq!(freq.count("a"), 10);
        assert_eq!(freq.count("b"), 6);
        assert_eq!(freq.count("c"), 4);
        assert_eq!(stage.kept.len(), 80);
    }

    #[test]
    fn test_singleton_rare_bucket_is_merged() {
        let ts = triples(&[("a", 10), ("b", 9), ("c", 1)]);
        let stage = stratified_split(&ts, 0.2, 3, 1).unwrap();
        assert_eq!(stage.rare_relations, vec!["c".to_string()]);
        assert_eq!(stage.kept.len() + stage.held_out.len(), 20);
    }

    #[test]
    fn test_single_triple_is_infeasible() {
        let ts = triples(&[("a", 1)]);
        let err = stratified_split(&ts, 0.2, 3, 1).unwrap_err();
        assert!(matches!(err, Error::PartitionInfeasible { members: 1, .. }));
    }

    #[test]
    fn test_output_keeps_input_order() {
        let ts = triples(&[("a", 20)]);
        let stage = stratified_split(&ts, 0.25, 3, 3).unwrap();
        let pos = |t: &Triple| ts.iter().position(|x| x == t).unwrap();
        assert!(stage.kept.windows(2).all(|w| pos(&w[0]) < pos(&w[1])));
        assert!(stage.held_out.windows(2).all(|w| pos(&w[0]) < pos(&w[1])));
    }

    #[test]
    fn test_from_ratio() {
        let c = SplitConfig::from_ratio(80.0, 10.0, 10.0).unwrap();
        assert!((c.train_fraction - 0.8).abs() < 1e-12);
        assert!((c.valid_fraction_of_rest - 0.5).abs() < 1e-12);
        assert!(SplitConfig::from_ratio(80.0, 0.0, 0.0).is_err());
        assert!(SplitConfig::from_ratio(0.0, 10.0, 10.0).is_err());
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let store = TripleStore::from(triples(&[("a", 10)]));
        let config = SplitConfig::default().with_train_fraction(1.0);
        assert!(matches!(
            partition(&store, &config),
            Err(Error::InvalidRatio(_))
        ));
    }
}
