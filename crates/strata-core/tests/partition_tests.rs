//! Partition invariants: completeness, disjointness, determinism and the
//! rare-bucket behaviour on sparse relations.

use proptest::prelude::*;
use strata_core::formats::Tsv;
use strata_core::partition::stratification_keys;
use strata_core::{partition, Error, SplitConfig, StratumKey, Triple, TripleStore};

/// Ten triples across three relations with counts 5, 4 and 1.
fn toy_graph() -> TripleStore {
    let mut triples = Vec::new();
    for i in 0..5 {
        triples.push(Triple::new(format!("p{}", i), "worksAt", "acme"));
    }
    for i in 0..4 {
        triples.push(Triple::new(format!("p{}", i), "livesIn", format!("city{}", i)));
    }
    triples.push(Triple::new("p0", "foundedBy", "p4"));
    triples.into()
}

fn sorted(mut v: Vec<Triple>) -> Vec<Triple> {
    v.sort();
    v
}

#[test]
fn test_toy_graph_rare_bucket_and_nonempty_splits() {
    let store = toy_graph();
    let config = SplitConfig::from_ratio(80.0, 10.0, 10.0)
        .unwrap()
        .with_min_count(2)
        .with_seed(42);

    let keys = stratification_keys(store.as_slice(), 2);
    let rare: Vec<&Triple> = store
        .iter()
        .zip(&keys)
        .filter(|(_, k)| **k == StratumKey::Rare)
        .map(|(t, _)| t)
        .collect();
    assert_eq!(rare.len(), 1);
    assert_eq!(rare[0].relation, "foundedBy");

    let split = partition(&store, &config).unwrap();
    assert_eq!(split.rare_first_stage, vec!["foundedBy".to_string()]);
    assert_eq!(split.train.len(), 8);
    assert_eq!(split.valid.len(), 1);
    assert_eq!(split.test.len(), 1);
}

#[test]
fn test_singleton_relation_does_not_make_split_infeasible() {
    let mut triples = Vec::new();
    for i in 0..12 {
        triples.push(Triple::new(format!("a{}", i), "r1", "x"));
    }
    for i in 0..9 {
        triples.push(Triple::new(format!("b{}", i), "r2", "y"));
    }
    triples.push(Triple::new("c", "once", "z"));
    let store = TripleStore::from(triples);

    let split = partition(&store, &SplitConfig::default().with_min_count(3)).unwrap();
    assert_eq!(split.total(), 22);
    assert!(split.rare_first_stage.contains(&"once".to_string()));
}

#[test]
fn test_single_triple_input_is_infeasible() {
    let store = TripleStore::from(vec![Triple::new("a", "r", "b")]);
    let err = partition(&store, &SplitConfig::default().with_min_count(3)).unwrap_err();
    assert!(matches!(err, Error::PartitionInfeasible { .. }), "{err}");
}

#[test]
fn test_two_triples_fail_in_second_stage() {
    let store = TripleStore::from(vec![Triple::new("a", "r", "b"), Triple::new("b", "r", "c")]);
    let err = partition(&store, &SplitConfig::default()).unwrap_err();
    assert!(matches!(err, Error::PartitionInfeasible { members: 1, .. }), "{err}");
}

#[test]
fn test_split_files_are_byte_identical_across_runs() {
    let store: TripleStore = (0..200)
        .map(|i| Triple::new(format!("e{}", i % 37), format!("r{}", i % 7), format!("e{}", i % 11)))
        .collect();
    let config = SplitConfig::default().with_seed(1234);

    let encode = |s: &TripleStore| {
        let mut buf = Vec::new();
        Tsv::write(&mut buf, s).unwrap();
        buf
    };

    let a = partition(&store, &config).unwrap();
    let b = partition(&store, &config).unwrap();
    assert_eq!(encode(&a.train), encode(&b.train));
    assert_eq!(encode(&a.valid), encode(&b.valid));
    assert_eq!(encode(&a.test), encode(&b.test));
}

#[test]
fn test_different_seeds_usually_differ() {
    let store: TripleStore = (0..200)
        .map(|i| Triple::new(format!("e{}", i), format!("r{}", i % 5), "t"))
        .collect();
    let a = partition(&store, &SplitConfig::default().with_seed(1)).unwrap();
    let b = partition(&store, &SplitConfig::default().with_seed(2)).unwrap();
    assert_ne!(a.test, b.test);
}

fn arb_triples() -> impl Strategy<Value = Vec<Triple>> {
    prop::collection::vec((0u8..10, 0u8..6, 0u8..10), 0..120).prop_map(|rows| {
        rows.into_iter()
            .map(|(h, r, t)| Triple::new(format!("e{}", h), format!("r{}", r), format!("e{}", t)))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn partition_is_complete_multiset(
        triples in arb_triples(),
        min_count in 0usize..6,
        seed in any::<u64>(),
    ) {
        let store = TripleStore::from(triples.clone());
        let config = SplitConfig::default().with_min_count(min_count).with_seed(seed);

        match partition(&store, &config) {
            Ok(split) => {
                let mut union = split.train.into_inner();
                union.extend(split.valid.into_inner());
                union.extend(split.test.into_inner());
                prop_assert_eq!(sorted(union), sorted(triples));
            }
            Err(Error::PartitionInfeasible { .. }) => {
                prop_assert!(triples.len() < 6, "infeasible with {} triples", triples.len());
            }
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }

    #[test]
    fn partition_is_disjoint_by_position(
        relations in prop::collection::vec(0u8..8, 6..150),
        seed in any::<u64>(),
    ) {
        // Tag each triple with its position so equal values stay distinguishable.
        let triples: Vec<Triple> = relations
            .iter()
            .enumerate()
            .map(|(i, r)| Triple::new(format!("row{}", i), format!("r{}", r), "x"))
            .collect();
        let split = partition(&TripleStore::from(triples.clone()), &SplitConfig::default().with_seed(seed))
            .unwrap();

        let mut seen = vec![0u8; triples.len()];
        for t in split.train.iter().chain(split.valid.iter()).chain(split.test.iter()) {
            let pos: usize = t.head.trim_start_matches("row").parse().unwrap();
            seen[pos] += 1;
        }
        prop_assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn partition_is_deterministic(triples in arb_triples(), seed in any::<u64>()) {
        let store = TripleStore::from(triples);
        let config = SplitConfig::default().with_seed(seed);
        let a = partition(&store, &config).ok();
        let b = partition(&store, &config).ok();
        prop_assert_eq!(a, b);
    }
}
