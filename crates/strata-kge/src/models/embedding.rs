//! Embedding tables and the SGD training loop.
//!
//! # Training
//!
//! Margin-based ranking loss with negative sampling:
//!
//! ```text
//! L = max(0, margin - f(h, r, t) + f(h', r, t'))
//! ```
//!
//! where (h', r, t') replaces the head or the tail with a random entity.
//! Gradients are accumulated per batch and applied once per batch. TransE
//! entity vectors are projected back into the unit ball after each update.

use crate::error::{Error, Result};
use crate::model::{KgeModel, ModelTrainer, TrainingConfig};
use crate::scoring::ModelFamily;
use crate::vocab::IdTriple;
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::collections::HashMap;

/// Dense entity and relation tables for one model family.
#[derive(Debug, Clone)]
pub struct EmbeddingModel {
    family: ModelFamily,
    dim: usize,
    entities: Array2<f32>,
    relations: Array2<f32>,
}

impl EmbeddingModel {
    /// Randomly initialised model (uniform in [-0.5, 0.5], rows normalised).
    pub fn new(
        family: ModelFamily,
        dim: usize,
        num_entities: usize,
        num_relations: usize,
        seed: u64,
    ) -> Self {
        let width = family.width(dim);
        let mut rng = XorShiftRng::seed_from_u64(seed);
        let entities = init_table(num_entities, width, &mut rng);
        let relations = init_table(num_relations, width, &mut rng);
        Self {
            family,
            dim,
            entities,
            relations,
        }
    }

    /// Build from pre-trained tables.
    pub fn from_tables(
        family: ModelFamily,
        entities: Array2<f32>,
        relations: Array2<f32>,
    ) -> Result<Self> {
        let width = entities.ncols();
        if relations.ncols() != width {
            return Err(Error::InvalidConfig(format!(
                "entity width {} does not match relation width {}",
                width,
                relations.ncols()
            )));
        }
        let dim = match family {
            ModelFamily::ComplEx if width % 2 != 0 => {
                return Err(Error::InvalidConfig(format!(
                    "ComplEx tables need an even width, got {}",
                    width
                )));
            }
            ModelFamily::ComplEx => width / 2,
            ModelFamily::TransE | ModelFamily::DistMult => width,
        };
        Ok(Self {
            family,
            dim,
            entities,
            relations,
        })
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn embedding_dim(&self) -> usize {
        self.dim
    }

    pub fn num_relations(&self) -> usize {
        self.relations.nrows()
    }

    pub fn entity_embedding(&self, id: usize) -> Option<ArrayView1<'_, f32>> {
        (id < self.entities.nrows()).then(|| self.entities.row(id))
    }

    pub fn relation_embedding(&self, id: usize) -> Option<ArrayView1<'_, f32>> {
        (id < self.relations.nrows()).then(|| self.relations.row(id))
    }

    fn check(&self, t: &IdTriple) -> Result<()> {
        if t.head >= self.entities.nrows() || t.tail >= self.entities.nrows() {
            return Err(Error::InvalidConfig(format!(
                "entity id out of range in ({}, {}, {}); model has {} entities",
                t.head,
                t.relation,
                t.tail,
                self.entities.nrows()
            )));
        }
        if t.relation >= self.relations.nrows() {
            return Err(Error::InvalidConfig(format!(
                "relation id {} out of range; model has {} relations",
                t.relation,
                self.relations.nrows()
            )));
        }
        Ok(())
    }

    fn score_one(&self, t: &IdTriple) -> f32 {
        self.family.score(
            self.entities.row(t.head),
            self.relations.row(t.relation),
            self.entities.row(t.tail),
        )
    }

    /// One epoch of SGD over `triples` in a seeded random order.
    ///
    /// Returns the mean loss over all sampled (positive, negative) pairs.
    fn train_epoch(
        &mut self,
        triples: &[IdTriple],
        config: &TrainingConfig,
        rng: &mut XorShiftRng,
    ) -> Result<f32> {
        let num_entities = self.entities.nrows();
        let mut order: Vec<usize> = (0..triples.len()).collect();
        order.shuffle(rng);

        let mut epoch_loss = 0.0;
        let mut num_pairs = 0usize;

        for batch in order.chunks(config.batch_size.max(1)) {
            let mut entity_grads: HashMap<usize, Array1<f32>> = HashMap::new();
            let mut relation_grads: HashMap<usize, Array1<f32>> = HashMap::new();

            for &i in batch {
                let pos = triples[i];
                let pos_score = self.score_one(&pos);

                for _ in 0..config.negative_samples {
                    let replacement = rng.random_range(0..num_entities);
                    let neg = if rng.random_bool(0.5) {
                        pos.with_head(replacement)
                    } else {
                        pos.with_tail(replacement)
                    };
                    if neg == pos {
                        continue;
                    }

                    let neg_score = self.score_one(&neg);
                    let raw = config.margin - pos_score + neg_score;
                    if !raw.is_finite() {
                        return Err(Error::TrainingFailure(format!(
                            "{} produced a non-finite score for ({}, {}, {})",
                            self.family, pos.head, pos.relation, pos.tail
                        )));
                    }
                    let loss = raw.max(0.0);
                    num_pairs += 1;
                    if loss <= 0.0 {
                        continue;
                    }
                    epoch_loss += loss;

                    // dL/dθ = -∇f(pos) + ∇f(neg)
                    self.accumulate(&pos, -1.0, &mut entity_grads, &mut relation_grads);
                    self.accumulate(&neg, 1.0, &mut entity_grads, &mut relation_grads);
                }
            }

            self.apply(&entity_grads, &relation_grads, config);
        }

        Ok(if num_pairs > 0 {
            epoch_loss / num_pairs as f32
        } else {
            0.0
        })
    }

    fn accumulate(
        &self,
        t: &IdTriple,
        sign: f32,
        entity_grads: &mut HashMap<usize, Array1<f32>>,
        relation_grads: &mut HashMap<usize, Array1<f32>>,
    ) {
        let (gh, gr, gt) = self.family.score_gradient(
            self.entities.row(t.head),
            self.relations.row(t.relation),
            self.entities.row(t.tail),
        );
        accumulate_grad(entity_grads, t.head, gh * sign);
        accumulate_grad(relation_grads, t.relation, gr * sign);
        accumulate_grad(entity_grads, t.tail, gt * sign);
    }

    fn apply(
        &mut self,
        entity_grads: &HashMap<usize, Array1<f32>>,
        relation_grads: &HashMap<usize, Array1<f32>>,
        config: &TrainingConfig,
    ) {
        let lr = config.learning_rate;
        let reg = config.regularization;

        for (&id, grad) in entity_grads {
            let mut row = self.entities.row_mut(id);
            row.zip_mut_with(grad, |p, &g| *p -= lr * (g + reg * *p));
            if self.family == ModelFamily::TransE {
                let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 1.0 {
                    row.mapv_inplace(|x| x / norm);
                }
            }
        }
        for (&id, grad) in relation_grads {
            let mut row = self.relations.row_mut(id);
            row.zip_mut_with(grad, |p, &g| *p -= lr * (g + reg * *p));
        }
    }
}

impl KgeModel for EmbeddingModel {
    fn score_batch(&self, triples: &[IdTriple]) -> Result<Vec<f32>> {
        triples
            .iter()
            .map(|t| {
                self.check(t)?;
                Ok(self.score_one(t))
            })
            .collect()
    }

    fn num_entities(&self) -> usize {
        self.entities.nrows()
    }

    fn name(&self) -> String {
        format!("{}(dim={})", self.family, self.dim)
    }
}

/// Trains [`EmbeddingModel`]s with mini-batch SGD.
#[derive(Debug, Clone, Copy, Default)]
pub struct SgdTrainer;

impl ModelTrainer for SgdTrainer {
    type Model = EmbeddingModel;

    fn train(
        &self,
        triples: &[IdTriple],
        num_entities: usize,
        num_relations: usize,
        config: &TrainingConfig,
    ) -> Result<EmbeddingModel> {
        if triples.is_empty() {
            return Err(Error::TrainingFailure("no training triples provided".into()));
        }
        if config.embedding_dim == 0 {
            return Err(Error::TrainingFailure("embedding dimension must be positive".into()));
        }
        if num_entities == 0 || num_relations == 0 {
            return Err(Error::TrainingFailure("empty entity or relation set".into()));
        }

        let mut model = EmbeddingModel::new(
            config.family,
            config.embedding_dim,
            num_entities,
            num_relations,
            config.seed,
        );
        for t in triples {
            model
                .check(t)
                .map_err(|e| Error::TrainingFailure(e.to_string()))?;
        }

        let mut rng = XorShiftRng::seed_from_u64(config.seed.wrapping_add(1));
        for epoch in 0..config.epochs {
            let loss = model.train_epoch(triples, config, &mut rng)?;
            if !loss.is_finite() {
                return Err(Error::TrainingFailure(format!(
                    "{} diverged at epoch {} (loss = {})",
                    config.family, epoch, loss
                )));
            }
            if epoch % 10 == 0 || epoch + 1 == config.epochs {
                tracing::debug!(family = %config.family, epoch, loss, "epoch finished");
            }
        }

        Ok(model)
    }
}

fn init_table(rows: usize, width: usize, rng: &mut XorShiftRng) -> Array2<f32> {
    let mut table = Array2::from_shape_simple_fn((rows, width), || rng.random::<f32>() - 0.5);
    for mut row in table.rows_mut() {
        let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-8 {
            row.mapv_inplace(|x| x / norm);
        }
    }
    table
}

fn accumulate_grad(grads: &mut HashMap<usize, Array1<f32>>, key: usize, grad: Array1<f32>) {
    grads
        .entry(key)
        .and_modify(|g| *g += &grad)
        .or_insert(grad);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Two disjoint chains: 0 -r-> 1 -r-> 2 -r-> 3 and 4 -r-> 5 -r-> 6 -r-> 7.
    fn chain() -> Vec<IdTriple> {
        vec![
            IdTriple::new(0, 0, 1),
            IdTriple::new(1, 0, 2),
            IdTriple::new(2, 0, 3),
            IdTriple::new(4, 0, 5),
            IdTriple::new(5, 0, 6),
            IdTriple::new(6, 0, 7),
        ]
    }

    fn config(family: ModelFamily) -> TrainingConfig {
        TrainingConfig::default()
            .with_family(family)
            .with_embedding_dim(16)
            .with_epochs(200)
            .with_batch_size(2)
            .with_learning_rate(0.05)
            .with_negative_samples(4)
            .with_seed(7)
    }

    #[test]
    fn test_training_is_deterministic() {
        for family in ModelFamily::ALL {
            let a = SgdTrainer.train(&chain(), 8, 1, &config(family)).unwrap();
            let b = SgdTrainer.train(&chain(), 8, 1, &config(family)).unwrap();
            assert_eq!(a.entities, b.entities, "{}", family);
            assert_eq!(a.relations, b.relations, "{}", family);
        }
    }

    #[test]
    fn test_transe_learns_chain() {
        let model = SgdTrainer
            .train(&chain(), 8, 1, &config(ModelFamily::TransE))
            .unwrap();
        let scores = model
            .score_batch(&[IdTriple::new(0, 0, 1), IdTriple::new(0, 0, 7)])
            .unwrap();
        assert!(scores[0] > scores[1], "{:?}", scores);
    }

    #[test]
    fn test_transe_entities_stay_in_unit_ball() {
        let model = SgdTrainer
            .train(&chain(), 8, 1, &config(ModelFamily::TransE))
            .unwrap();
        for row in model.entities.rows() {
            let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!(norm <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn test_complex_width_is_doubled() {
        let model = EmbeddingModel::new(ModelFamily::ComplEx, 5, 3, 2, 0);
        assert_eq!(model.entity_embedding(0).unwrap().len(), 10);
        assert_eq!(model.embedding_dim(), 5);
        assert!(model.entity_embedding(3).is_none());
    }

    #[test]
    fn test_score_out_of_range_is_error() {
        let model = EmbeddingModel::new(ModelFamily::DistMult, 4, 3, 1, 0);
        assert!(model.score_batch(&[IdTriple::new(0, 0, 3)]).is_err());
        assert!(model.score_batch(&[IdTriple::new(0, 1, 2)]).is_err());
    }

    #[test]
    fn test_empty_training_set_fails() {
        let err = SgdTrainer
            .train(&[], 3, 1, &TrainingConfig::default())
            .unwrap_err();
        assert!(err.is_training_failure());
    }

    #[test]
    fn test_divergence_is_training_failure() {
        let config = config(ModelFamily::DistMult)
            .with_learning_rate(1.0e30)
            .with_epochs(20);
        let err = SgdTrainer.train(&chain(), 8, 1, &config).unwrap_err();
        assert!(err.is_training_failure(), "{}", err);
    }

    #[test]
    fn test_from_tables() {
        let entities = array![[1.0, 0.0], [0.0, 1.0]];
        let relations = array![[0.0, 1.0]];
        let model = EmbeddingModel::from_tables(ModelFamily::ComplEx, entities, relations).unwrap();
        assert_eq!(model.embedding_dim(), 1);
        let s = model.score_batch(&[IdTriple::new(0, 0, 1)]).unwrap();
        assert!((s[0] - 1.0).abs() < 1e-6);

        let odd = EmbeddingModel::from_tables(
            ModelFamily::ComplEx,
            array![[1.0, 0.0, 0.0]],
            array![[1.0, 0.0, 0.0]],
        );
        assert!(odd.is_err());
    }
}
