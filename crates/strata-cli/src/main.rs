//! Strata CLI - link-prediction dataset preparation and benchmarking.
//!
//! # Usage
//!
//! ```bash
//! # Split a triple file into train/valid/test (80/10/10, stratified by relation)
//! strata split triples.tsv --out-dir data/
//!
//! # Show counts and the relation frequency table
//! strata stats data/train.tsv
//!
//! # Grid search over TransE/DistMult/ComplEx, write the result table
//! strata bench data/train.tsv data/valid.tsv data/test.tsv -o results.csv
//!
//! # Same, with the search space from a JSON file and a smaller budget
//! strata bench data/train.tsv data/valid.tsv data/test.tsv --config grid.json --epochs 20
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use strata_core::formats::Tsv;
use strata_core::{partition, SplitConfig, TripleStore};
use strata_kge::report::{format_table, write_trials_path};
use strata_kge::{GridConfig, GridEvent, GridSearch, MappedDataset, ModelFamily, SgdTrainer};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Stratified KG splits and embedding benchmarks", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a triple file into train/valid/test, stratified by relation
    Split {
        /// Input file (tab-separated head, relation, tail; no header)
        input: PathBuf,

        /// Directory for train.tsv, valid.tsv and test.tsv
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Train,valid,test proportions
        #[arg(long, value_delimiter = ',', default_values_t = [80.0, 10.0, 10.0])]
        ratio: Vec<f64>,

        /// Relations with fewer triples share the `rare` stratum
        #[arg(long, default_value = "3")]
        min_count: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Drop triples whose literal tail is longer than this (0 keeps all)
        #[arg(long, default_value = "200")]
        max_literal_len: usize,
    },

    /// Grid-search embedding models and report validation and test ranks
    Bench {
        /// Training split
        train: PathBuf,

        /// Validation split
        valid: PathBuf,

        /// Test split
        test: PathBuf,

        /// Result table (CSV)
        #[arg(short, long, default_value = "results.csv")]
        output: PathBuf,

        /// Grid configuration (JSON); flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Model families, comma-separated (transe, distmult, complex)
        #[arg(long, value_delimiter = ',')]
        families: Option<Vec<ModelFamily>>,

        /// Embedding dimensions, comma-separated
        #[arg(long, value_delimiter = ',')]
        dims: Option<Vec<usize>>,

        /// Negative samples per positive, comma-separated
        #[arg(long, value_delimiter = ',')]
        negs: Option<Vec<usize>>,

        /// Training epochs per trial
        #[arg(long)]
        epochs: Option<usize>,

        /// Target batches per epoch
        #[arg(long)]
        batches: Option<usize>,

        /// Learning rate
        #[arg(long)]
        lr: Option<f32>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show triple, entity and relation counts
    Stats {
        /// Input file (tab-separated)
        input: PathBuf,
    },
}

/// Flag overrides for [`GridConfig`].
struct GridOverrides {
    families: Option<Vec<ModelFamily>>,
    dims: Option<Vec<usize>>,
    negs: Option<Vec<usize>>,
    epochs: Option<usize>,
    batches: Option<usize>,
    lr: Option<f32>,
    seed: Option<u64>,
}

impl GridOverrides {
    fn apply(self, config: &mut GridConfig) {
        if let Some(families) = self.families {
            config.families = families;
        }
        if let Some(dims) = self.dims {
            config.embedding_dims = dims;
        }
        if let Some(negs) = self.negs {
            config.negative_samples = negs;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(batches) = self.batches {
            config.batches_per_epoch = batches;
        }
        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Split {
            input,
            out_dir,
            ratio,
            min_count,
            seed,
            max_literal_len,
        } => cmd_split(&input, &out_dir, &ratio, min_count, seed, max_literal_len),
        Commands::Bench {
            train,
            valid,
            test,
            output,
            config,
            families,
            dims,
            negs,
            epochs,
            batches,
            lr,
            seed,
        } => {
            let overrides = GridOverrides {
                families,
                dims,
                negs,
                epochs,
                batches,
                lr,
                seed,
            };
            cmd_bench(&train, &valid, &test, &output, config.as_deref(), overrides)
        }
        Commands::Stats { input } => cmd_stats(&input),
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_triples(path: &Path) -> Result<TripleStore> {
    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Loading {}...", path.display()));

    let store = Tsv::read_path(path).with_context(|| format!("Failed to load {}", path.display()))?;

    pb.finish_and_clear();
    tracing::info!(
        path = %path.display(),
        triples = store.len(),
        elapsed = ?start.elapsed(),
        "loaded"
    );
    Ok(store)
}

fn cmd_split(
    input: &Path,
    out_dir: &Path,
    ratio: &[f64],
    min_count: usize,
    seed: u64,
    max_literal_len: usize,
) -> Result<()> {
    let [train, valid, test] = ratio else {
        bail!("--ratio takes three values (train,valid,test), got {}", ratio.len());
    };
    let config = SplitConfig::from_ratio(*train, *valid, *test)?
        .with_min_count(min_count)
        .with_seed(seed);

    let mut store = load_triples(input)?;
    if max_literal_len > 0 {
        let dropped = store.drop_long_literals(max_literal_len);
        if dropped > 0 {
            println!(
                "Dropped {} triples with literals longer than {} characters",
                dropped, max_literal_len
            );
        }
    }

    let split = partition(&store, &config)
        .with_context(|| format!("Failed to split {}", input.display()))?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    for (name, part) in [
        ("train.tsv", &split.train),
        ("valid.tsv", &split.valid),
        ("test.tsv", &split.test),
    ] {
        let path = out_dir.join(name);
        Tsv::write_path(&path, part)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!(
        "Total triples: {} -> train={}, valid={}, test={}",
        split.total(),
        split.train.len(),
        split.valid.len(),
        split.test.len()
    );
    if !split.rare_first_stage.is_empty() {
        println!("Rare relations: {}", split.rare_first_stage.join(", "));
    }
    Ok(())
}

fn cmd_bench(
    train: &Path,
    valid: &Path,
    test: &Path,
    output: &Path,
    config_path: Option<&Path>,
    overrides: GridOverrides,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => GridConfig::from_json_path(path)
            .with_context(|| format!("Failed to load grid config {}", path.display()))?,
        None => GridConfig::default(),
    };
    overrides.apply(&mut config);

    let train = load_triples(train)?;
    let valid = load_triples(valid)?;
    let test = load_triples(test)?;
    let dataset = MappedDataset::new(train.as_slice(), valid.as_slice(), test.as_slice())?;

    println!(
        "Vocabulary: {} entities, {} relations",
        dataset.vocab.num_entities(),
        dataset.vocab.num_relations()
    );
    println!(
        "Mapped: train={}, valid={}, test={} (dropped out-of-vocabulary: valid={}, test={})",
        dataset.train.len(),
        dataset.valid.len(),
        dataset.test.len(),
        dataset.valid.dropped,
        dataset.test.dropped
    );

    let mut search = GridSearch::new(SgdTrainer, config)?;
    let pb = ProgressBar::new(search.config().len() as u64);
    pb.set_style(ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}",
    )?);

    let start = Instant::now();
    let report = search.run_with_progress(&dataset, |event| match event {
        GridEvent::TrialStarted { config, .. } => pb.set_message(config.to_string()),
        GridEvent::TrialFinished { .. } => pb.inc(1),
        GridEvent::FinalEvaluation { config } => {
            pb.set_message(format!("test evaluation ({})", config));
        }
    })?;
    pb.finish_and_clear();

    write_trials_path(output, &report.trials)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("\nValidation results (sorted by MRR):");
    print!("{}", format_table(report.ranked()));

    let best = report.best();
    println!(
        "\nBest configuration: {} dim={} negs={} (validation MRR {:.4}, Hits@10 {:.4})",
        best.model, best.dim, best.negs, best.mrr, best.hits_at_10
    );
    println!(
        "Test MRR: {:.4}, Hits@10: {:.4}",
        report.test.mrr, report.test.hits_at_10
    );
    println!("Test {}", report.test.summary());
    println!(
        "Wrote {} trials to {} in {:.2?}",
        report.trials.len(),
        output.display(),
        start.elapsed()
    );
    Ok(())
}

fn cmd_stats(input: &Path) -> Result<()> {
    let store = load_triples(input)?;
    let freq = store.relation_frequencies();
    let literals = store.iter().filter(|t| t.tail_is_literal()).count();

    println!("Triple Set Statistics");
    println!("=====================");
    println!("Triples:        {}", store.len());
    println!("Entities:       {}", store.entity_count());
    println!("Relation types: {}", freq.len());
    println!("Literal tails:  {}", literals);

    let mut rows: Vec<(&str, usize)> = freq.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    println!("\nRelation frequencies:");
    for (relation, count) in rows {
        println!("  {:>8}  {}", count, relation);
    }
    Ok(())
}
