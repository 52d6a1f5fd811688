//! Filtered rank evaluation for link prediction.
//!
//! # The Link Prediction Task
//!
//! Given a test triple (h, r, t), we evaluate by:
//! 1. **Tail prediction**: score all (h, r, ?) candidates, rank the true tail
//! 2. **Head prediction**: score all (?, r, t) candidates, rank the true head
//!
//! Both ranks of every test triple go into one pool; MRR and Hits@K are
//! computed over that pool.
//!
//! # Filtered vs Raw Metrics
//!
//! | Setting | Description | Use Case |
//! |---------|-------------|----------|
//! | Raw | All entities as negatives | Pessimistic estimate |
//! | Filtered | Remove known true triples | Standard benchmark |
//!
//! Only the filtered setting is computed here. The filter set is usually the
//! ID-mapped training split.
//!
//! # Ties
//!
//! A candidate scoring exactly the same as the true triple counts as ranked
//! above it, so a model that scores everything equally gets the worst
//! possible rank rather than the best.
//!
//! # Standard Metrics
//!
//! | Metric | Range | Description |
//! |--------|-------|-------------|
//! | MRR | (0, 1] | Mean Reciprocal Rank: average of 1/rank |
//! | MR | [1, n] | Mean Rank |
//! | Hits@1 | [0, 1] | Fraction with rank = 1 |
//! | Hits@3 | [0, 1] | Fraction with rank <= 3 |
//! | Hits@10 | [0, 1] | Fraction with rank <= 10 |

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::KgeModel;
use crate::vocab::IdTriple;

/// Default number of candidates scored per model call.
pub const DEFAULT_EVAL_BATCH_SIZE: usize = 256;

/// Rank-based evaluation results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankMetrics {
    /// Mean Reciprocal Rank: E\[1/rank\]
    pub mrr: f64,
    /// Mean Rank: E\[rank\]
    pub mr: f64,
    /// Hits@1: P(rank = 1)
    pub hits_at_1: f64,
    /// Hits@3: P(rank <= 3)
    pub hits_at_3: f64,
    /// Hits@10: P(rank <= 10)
    pub hits_at_10: f64,
    /// Number of pooled ranks (two per evaluated triple)
    pub num_ranks: usize,
}

impl RankMetrics {
    /// Compute metrics from a list of ranks.
    pub fn from_ranks(ranks: &[usize]) -> Self {
        if ranks.is_empty() {
            return Self::default();
        }

        let n = ranks.len() as f64;
        let mr: f64 = ranks.iter().map(|&r| r as f64).sum::<f64>() / n;

        Self {
            mrr: mean_reciprocal_rank(ranks),
            mr,
            hits_at_1: hits_at_k(ranks, 1),
            hits_at_3: hits_at_k(ranks, 3),
            hits_at_10: hits_at_k(ranks, 10),
            num_ranks: ranks.len(),
        }
    }

    /// Merge metrics from multiple evaluation runs, weighted by rank count.
    pub fn merge(metrics: &[Self]) -> Self {
        let total: usize = metrics.iter().map(|m| m.num_ranks).sum();
        if total == 0 {
            return Self::default();
        }

        let total_f = total as f64;
        let weighted = |f: fn(&Self) -> f64| {
            metrics
                .iter()
                .map(|m| f(m) * m.num_ranks as f64)
                .sum::<f64>()
                / total_f
        };

        Self {
            mrr: weighted(|m| m.mrr),
            mr: weighted(|m| m.mr),
            hits_at_1: weighted(|m| m.hits_at_1),
            hits_at_3: weighted(|m| m.hits_at_3),
            hits_at_10: weighted(|m| m.hits_at_10),
            num_ranks: total,
        }
    }

    /// Format as summary string.
    pub fn summary(&self) -> String {
        format!(
            "MRR: {:.4} | MR: {:.1} | H@1: {:.3} | H@3: {:.3} | H@10: {:.3} (n={})",
            self.mrr, self.mr, self.hits_at_1, self.hits_at_3, self.hits_at_10, self.num_ranks
        )
    }
}

/// Arithmetic mean of 1/rank; 0.0 for no ranks.
pub fn mean_reciprocal_rank(ranks: &[usize]) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    ranks.iter().map(|&r| 1.0 / r as f64).sum::<f64>() / ranks.len() as f64
}

/// Fraction of ranks <= `k`; 0.0 for no ranks.
pub fn hits_at_k(ranks: &[usize], k: usize) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    ranks.iter().filter(|&&r| r <= k).count() as f64 / ranks.len() as f64
}

/// The two ranks of one evaluated triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankRecord {
    /// Rank of the true tail among corrupted tails.
    pub tail_rank: usize,
    /// Rank of the true head among corrupted heads.
    pub head_rank: usize,
}

/// Pool head and tail ranks of every record.
pub fn pooled_ranks(records: &[RankRecord]) -> Vec<usize> {
    records
        .iter()
        .flat_map(|r| [r.tail_rank, r.head_rank])
        .collect()
}

/// Filtered-rank evaluator.
///
/// Holds the filter set and the scoring batch size. The batch size only
/// controls how many candidates go to the model per call; results do not
/// depend on it.
#[derive(Debug, Clone)]
pub struct Evaluator {
    filter: HashSet<IdTriple>,
    batch_size: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Evaluator with an empty filter set.
    pub fn new() -> Self {
        Self {
            filter: HashSet::new(),
            batch_size: DEFAULT_EVAL_BATCH_SIZE,
        }
    }

    /// Use `known` as the filter set.
    pub fn with_filter<'a, I>(mut self, known: I) -> Self
    where
        I: IntoIterator<Item = &'a IdTriple>,
    {
        self.filter = known.into_iter().copied().collect();
        self
    }

    /// Candidates scored per model call (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn filter_len(&self) -> usize {
        self.filter.len()
    }

    /// Whether `triple` is a known fact excluded from candidate pools.
    pub fn is_filtered(&self, triple: &IdTriple) -> bool {
        self.filter.contains(triple)
    }

    /// Filtered rank of the true tail of `triple`.
    pub fn rank_tail<M: KgeModel + ?Sized>(&self, model: &M, triple: &IdTriple) -> Result<usize> {
        let candidates = (0..model.num_entities())
            .filter(|&e| e != triple.tail)
            .map(|e| triple.with_tail(e));
        self.rank(model, triple, candidates)
    }

    /// Filtered rank of the true head of `triple`.
    pub fn rank_head<M: KgeModel + ?Sized>(&self, model: &M, triple: &IdTriple) -> Result<usize> {
        let candidates = (0..model.num_entities())
            .filter(|&e| e != triple.head)
            .map(|e| triple.with_head(e));
        self.rank(model, triple, candidates)
    }

    /// Tail and head ranks of every triple, in input order.
    pub fn rank_records<M: KgeModel + ?Sized>(
        &self,
        model: &M,
        triples: &[IdTriple],
    ) -> Result<Vec<RankRecord>> {
        triples
            .iter()
            .map(|t| {
                Ok(RankRecord {
                    tail_rank: self.rank_tail(model, t)?,
                    head_rank: self.rank_head(model, t)?,
                })
            })
            .collect()
    }

    /// Pooled metrics over `triples`.
    pub fn evaluate<M: KgeModel + ?Sized>(
        &self,
        model: &M,
        triples: &[IdTriple],
    ) -> Result<RankMetrics> {
        let records = self.rank_records(model, triples)?;
        let metrics = RankMetrics::from_ranks(&pooled_ranks(&records));
        tracing::debug!(
            model = %model.name(),
            triples = triples.len(),
            mrr = metrics.mrr,
            "evaluated"
        );
        Ok(metrics)
    }

    fn rank<M, I>(&self, model: &M, triple: &IdTriple, candidates: I) -> Result<usize>
    where
        M: KgeModel + ?Sized,
        I: Iterator<Item = IdTriple>,
    {
        let true_score = self.score_checked(model, std::slice::from_ref(triple))?[0];

        let pool: Vec<IdTriple> = candidates.filter(|c| !self.is_filtered(c)).collect();
        let mut above = 0usize;
        for batch in pool.chunks(self.batch_size) {
            above += self
                .score_checked(model, batch)?
                .into_iter()
                .filter(|&s| s >= true_score)
                .count();
        }
        Ok(above + 1)
    }

    fn score_checked<M: KgeModel + ?Sized>(
        &self,
        model: &M,
        batch: &[IdTriple],
    ) -> Result<Vec<f32>> {
        let scores = model.score_batch(batch)?;
        if scores.len() != batch.len() {
            return Err(Error::ScoreCountMismatch {
                expected: batch.len(),
                actual: scores.len(),
            });
        }
        if let Some((t, &score)) = batch.iter().zip(&scores).find(|(_, s)| !s.is_finite()) {
            return Err(Error::NonFiniteScore {
                score,
                head: t.head,
                relation: t.relation,
                tail: t.tail,
            });
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Scores from a lookup table; unknown triples score 0.
    struct TableModel {
        scores: HashMap<IdTriple, f32>,
        num_entities: usize,
        calls: RefCell<Vec<usize>>,
    }

    impl TableModel {
        fn new(num_entities: usize, scores: &[((usize, usize, usize), f32)]) -> Self {
            Self {
                scores: scores
                    .iter()
                    .map(|&((h, r, t), s)| (IdTriple::new(h, r, t), s))
                    .collect(),
                num_entities,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl KgeModel for TableModel {
        fn score_batch(&self, triples: &[IdTriple]) -> Result<Vec<f32>> {
            self.calls.borrow_mut().push(triples.len());
            Ok(triples
                .iter()
                .map(|t| self.scores.get(t).copied().unwrap_or(0.0))
                .collect())
        }

        fn num_entities(&self) -> usize {
            self.num_entities
        }

        fn name(&self) -> String {
            "table".into()
        }
    }

    #[test]
    fn test_metric_arithmetic() {
        let ranks = [1, 2, 4, 1];
        assert!((mean_reciprocal_rank(&ranks) - 0.6875).abs() < 1e-12);
        assert!((hits_at_k(&ranks, 1) - 0.5).abs() < 1e-12);
        assert!((hits_at_k(&ranks, 2) - 0.75).abs() < 1e-12);

        let m = RankMetrics::from_ranks(&ranks);
        assert!((m.mrr - 0.6875).abs() < 1e-12);
        assert!((m.mr - 2.0).abs() < 1e-12);
        assert_eq!(m.num_ranks, 4);
    }

    #[test]
    fn test_empty_ranks() {
        let m = RankMetrics::from_ranks(&[]);
        assert_eq!(m, RankMetrics::default());
        assert_eq!(hits_at_k(&[], 10), 0.0);
    }

    #[test]
    fn test_merge_weights_by_count() {
        let a = RankMetrics::from_ranks(&[1, 1]);
        let b = RankMetrics::from_ranks(&[2, 2, 2, 2, 2, 2]);
        let merged = RankMetrics::merge(&[a, b]);
        let direct = RankMetrics::from_ranks(&[1, 1, 2, 2, 2, 2, 2, 2]);
        assert!((merged.mrr - direct.mrr).abs() < 1e-12);
        assert_eq!(merged.num_ranks, 8);
    }

    /// Four entities, one relation. The test fact is (0, 0, 1); (0, 0, 2)
    /// is also true and scores higher.
    fn toy() -> TableModel {
        TableModel::new(
            4,
            &[
                ((0, 0, 1), 0.8),
                ((0, 0, 2), 0.9),
                ((0, 0, 3), 0.1),
                ((1, 0, 1), 0.2),
                ((2, 0, 1), 0.3),
                ((3, 0, 1), 0.95),
            ],
        )
    }

    #[test]
    fn test_filter_changes_tail_rank() {
        let model = toy();
        let test = IdTriple::new(0, 0, 1);

        let raw = Evaluator::new();
        assert_eq!(raw.rank_tail(&model, &test).unwrap(), 2);

        let filtered = Evaluator::new().with_filter(&[IdTriple::new(0, 0, 2)]);
        assert_eq!(filtered.rank_tail(&model, &test).unwrap(), 1);
    }

    #[test]
    fn test_head_rank_and_pooling() {
        let model = toy();
        let test = IdTriple::new(0, 0, 1);
        let evaluator = Evaluator::new().with_filter(&[IdTriple::new(0, 0, 2), IdTriple::new(3, 0, 1)]);

        assert_eq!(evaluator.rank_head(&model, &test).unwrap(), 1);
        let records = evaluator.rank_records(&model, &[test]).unwrap();
        assert_eq!(
            records,
            vec![RankRecord {
                tail_rank: 1,
                head_rank: 1
            }]
        );

        let unfiltered_head = Evaluator::new().rank_head(&model, &test).unwrap();
        assert_eq!(unfiltered_head, 2);
        let m = Evaluator::new().evaluate(&model, &[test]).unwrap();
        assert_eq!(m.num_ranks, 2);
        assert!((m.mrr - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_ties_get_worst_rank() {
        let model = TableModel::new(5, &[]);
        let rank = Evaluator::new()
            .rank_tail(&model, &IdTriple::new(0, 0, 1))
            .unwrap();
        assert_eq!(rank, 5);
    }

    #[test]
    fn test_batch_size_does_not_change_ranks() {
        let scores: Vec<((usize, usize, usize), f32)> = (0..40)
            .flat_map(|i| {
                [
                    ((i, 0, (i * 7 + 3) % 40), ((i * 13) % 17) as f32 / 17.0),
                    ((i, 0, (i + 1) % 40), ((i * 5) % 11) as f32 / 11.0),
                ]
            })
            .collect();
        let model = TableModel::new(40, &scores);
        let test: Vec<IdTriple> = (0..10).map(|i| IdTriple::new(i, 0, (i + 1) % 40)).collect();
        let filter: Vec<IdTriple> = (0..40).map(|i| IdTriple::new(i, 0, (i * 7 + 3) % 40)).collect();

        let reference = Evaluator::new()
            .with_filter(&filter)
            .with_batch_size(1000)
            .rank_records(&model, &test)
            .unwrap();
        for batch_size in [1, 3, 7, 256] {
            let records = Evaluator::new()
                .with_filter(&filter)
                .with_batch_size(batch_size)
                .rank_records(&model, &test)
                .unwrap();
            assert_eq!(records, reference, "batch size {}", batch_size);
        }
    }

    #[test]
    fn test_batch_size_bounds_model_calls() {
        let model = TableModel::new(10, &[]);
        Evaluator::new()
            .with_batch_size(4)
            .rank_tail(&model, &IdTriple::new(0, 0, 1))
            .unwrap();
        // one call for the true triple, then 9 candidates in chunks of 4
        assert_eq!(*model.calls.borrow(), vec![1, 4, 4, 1]);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let model = toy();
        let test = [IdTriple::new(0, 0, 1), IdTriple::new(0, 0, 3)];
        let evaluator = Evaluator::new().with_filter(&[IdTriple::new(0, 0, 2)]);
        let a = evaluator.evaluate(&model, &test).unwrap();
        let b = evaluator.evaluate(&model, &test).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_nan_score_is_error() {
        let model = TableModel::new(3, &[((0, 0, 2), f32::NAN)]);
        let err = Evaluator::new()
            .rank_tail(&model, &IdTriple::new(0, 0, 1))
            .unwrap_err();
        assert!(matches!(err, Error::NonFiniteScore { tail: 2, .. }));
        assert!(err.is_training_failure());
    }

    struct ShortModel;

    impl KgeModel for ShortModel {
        fn score_batch(&self, _triples: &[IdTriple]) -> Result<Vec<f32>> {
            Ok(vec![])
        }

        fn num_entities(&self) -> usize {
            3
        }

        fn name(&self) -> String {
            "short".into()
        }
    }

    #[test]
    fn test_score_count_mismatch() {
        let err = Evaluator::new()
            .rank_tail(&ShortModel, &IdTriple::new(0, 0, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ScoreCountMismatch {
                expected: 1,
                actual: 0
            }
        ));
    }
}
