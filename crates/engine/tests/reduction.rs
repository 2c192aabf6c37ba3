//! End-to-end reductions through the driver with scripted and real scorers.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use sitemaster_config::ScoringConfig;
use sitemaster_core::{CandidatePair, FieldScores, Record, RecordId, SiteFields};
use sitemaster_engine::{
    Driver, EngineError, MemoryStore, ScoreMode, ScoreRequest, Scorer, ScorerError,
    SimilarityScorer,
};

fn record(id: u64, name: &str) -> Record {
    Record {
        id: RecordId(id),
        country: "USA".into(),
        fields: SiteFields {
            site_name: name.into(),
            ..Default::default()
        },
        display: SiteFields {
            site_name: name.to_uppercase(),
            ..Default::default()
        },
        extra: Default::default(),
    }
}

fn site(id: u64, name: &str, city: &str, address: &str, postal: &str) -> Record {
    let fields = SiteFields {
        site_name: name.into(),
        state: "ca".into(),
        city: city.into(),
        concat_address: address.into(),
        postal_code: postal.into(),
    };
    Record {
        id: RecordId(id),
        country: "USA".into(),
        display: fields.clone(),
        fields,
        extra: Default::default(),
    }
}

fn candidate(child: u64, master: u64, total: f64) -> CandidatePair {
    CandidatePair {
        child_id: RecordId(child),
        master_id: RecordId(master),
        scores: FieldScores {
            site_name: 1.0,
            ..Default::default()
        },
        total_score: total,
    }
}

/// Returns canned candidates per comparison tag and records every call.
#[derive(Default)]
struct Scripted {
    answers: HashMap<String, Vec<CandidatePair>>,
    fail_on: Option<String>,
    calls: Vec<String>,
}

impl Scripted {
    fn answer(mut self, tag: &str, pairs: Vec<CandidatePair>) -> Self {
        self.answers.insert(tag.to_string(), pairs);
        self
    }
}

impl Scorer for Scripted {
    fn score(&mut self, request: &ScoreRequest<'_>) -> Result<Vec<CandidatePair>, ScorerError> {
        self.calls.push(request.label.to_string());
        if self.fail_on.as_deref() == Some(request.label) {
            return Err(ScorerError::Timeout { seconds: 600 });
        }
        Ok(self.answers.get(request.label).cloned().unwrap_or_default())
    }
}

fn master_of(outcome: &sitemaster_engine::CountryOutcome, id: u64) -> u64 {
    outcome.ledger.get(RecordId(id)).unwrap().master_id.0
}

#[test]
fn seven_batches_reduce_in_four_levels() {
    let records: Vec<Record> = (1..=7).map(|i| record(i, "x")).collect();
    let scoring = ScoringConfig::default();
    let mut scorer = Scripted::default();
    let mut store = MemoryStore::new();

    let outcome = Driver::new(&scoring, 1, &mut scorer, &mut store)
        .run_country("USA", &records)
        .unwrap();

    assert_eq!(outcome.stats.batches, 7);
    assert_eq!(outcome.stats.levels, 4);
    // 3 + 2 + 1 linkage calls; level 4 is a pass-through
    assert_eq!(scorer.calls, vec!["d1_0", "d1_1", "d1_2", "d2_0", "d2_1", "d3_0"]);
    assert_eq!(outcome.masters.len(), 7);
    assert!(store.master_ids("USA_d4_0_Master.csv").is_some());
    assert!(store.master_ids("USA_d4_1_Master.csv").is_none());
    assert_eq!(store.level_cross_refs.len(), 4);
}

#[test]
fn links_from_earlier_levels_follow_later_merges() {
    let records: Vec<Record> = (1..=4).map(|i| record(i, "mercy")).collect();
    let scoring = ScoringConfig::default();
    let mut scorer = Scripted::default()
        .answer("0", vec![candidate(1, 2, 5.0)])
        .answer("1", vec![candidate(4, 3, 6.0)])
        .answer("d1_0", vec![candidate(2, 3, 4.5)]);
    let mut store = MemoryStore::new();

    let outcome = Driver::new(&scoring, 2, &mut scorer, &mut store)
        .run_country("USA", &records)
        .unwrap();

    assert_eq!(outcome.masters, vec![RecordId(3)]);
    for id in 1..=4 {
        assert_eq!(master_of(&outcome, id), 3, "record {id}");
    }
    // record 1 now carries the evidence of the merge that moved its master
    assert_eq!(outcome.ledger.get(RecordId(1)).unwrap().total_score, 4.5);
    assert_eq!(outcome.ledger.get(RecordId(4)).unwrap().total_score, 6.0);

    assert!(store.cleaned_scores.contains_key("USA_0_Cleaned_Feature_Scores.csv"));
    assert!(store.cleaned_scores.contains_key("USA_d1_0_Cleaned_Feature_Scores.csv"));
    let level = &store.level_cross_refs["USA_d1_Raw_Cross_Ref.csv"];
    let ids: Vec<u64> = level.iter().map(|e| e.record_id.0).collect();
    assert_eq!(ids, vec![2, 3]);

    let report = &store.reports["USA_Cross_Ref_Full_Report.csv"];
    assert_eq!(report.len(), 4);
    assert_eq!(report[0].master.as_ref().unwrap().site_name, "MERCY");
}

#[test]
fn chain_inside_one_batch_collapses() {
    let records = vec![record(1, "a"), record(2, "mercy"), record(3, "mercy")];
    let scoring = ScoringConfig::default();
    let mut scorer =
        Scripted::default().answer("0", vec![candidate(1, 2, 5.0), candidate(2, 3, 3.0)]);
    let mut store = MemoryStore::new();

    let outcome = Driver::new(&scoring, 10, &mut scorer, &mut store)
        .run_country("USA", &records)
        .unwrap();

    assert_eq!(outcome.masters, vec![RecordId(3)]);
    assert_eq!(master_of(&outcome, 1), 3);
    assert_eq!(master_of(&outcome, 2), 3);
    assert_eq!(outcome.stats.redirected_links, 1);
}

#[test]
fn chain_with_distinct_names_keeps_middle_master() {
    let records = vec![record(1, "a"), record(2, "b"), record(3, "c")];
    let scoring = ScoringConfig::default();
    let mut scorer =
        Scripted::default().answer("0", vec![candidate(1, 2, 5.0), candidate(2, 3, 3.0)]);
    let mut store = MemoryStore::new();

    let outcome = Driver::new(&scoring, 10, &mut scorer, &mut store)
        .run_country("USA", &records)
        .unwrap();

    assert_eq!(outcome.masters, vec![RecordId(2), RecordId(3)]);
    assert_eq!(master_of(&outcome, 1), 2);
    assert_eq!(outcome.stats.dropped_links, 1);
}

#[test]
fn mutual_pair_leaves_one_master() {
    let records = vec![record(1, "a"), record(2, "b")];
    let scoring = ScoringConfig::default();
    let mut scorer =
        Scripted::default().answer("0", vec![candidate(1, 2, 5.0), candidate(2, 1, 3.0)]);
    let mut store = MemoryStore::new();

    let outcome = Driver::new(&scoring, 10, &mut scorer, &mut store)
        .run_country("USA", &records)
        .unwrap();

    assert_eq!(outcome.masters.len(), 1);
}

#[test]
fn scorer_failure_at_a_level_aborts() {
    let records: Vec<Record> = (1..=4).map(|i| record(i, "x")).collect();
    let scoring = ScoringConfig::default();
    let mut scorer = Scripted {
        fail_on: Some("d1_0".into()),
        ..Default::default()
    };
    let mut store = MemoryStore::new();

    let err = Driver::new(&scoring, 2, &mut scorer, &mut store)
        .run_country("USA", &records)
        .unwrap_err();
    match err {
        EngineError::Scorer { comparison, source } => {
            assert_eq!(comparison, "USA depth 1 slot 0");
            assert!(matches!(source, ScorerError::Timeout { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.final_cross_refs.is_empty());
}

#[test]
fn similarity_scorer_finds_duplicates_across_batches() {
    let records = vec![
        site(1, "mercy hospital", "fresno", "1 main st", "93701"),
        site(2, "county clinic", "oakland", "77 elm ave", "94601"),
        site(3, "mercy hospital", "fresno", "1 main st", "93701"),
        site(4, "st agnes medical", "fresno", "900 herndon ave", "93720"),
        site(5, "county clinic", "oakland", "77 elm ave", "94601"),
        site(6, "valley childrens", "madera", "9300 valley childrens pl", "93636"),
    ];
    let scoring = ScoringConfig::default();
    let mut scorer = SimilarityScorer::new();
    let mut store = MemoryStore::new();

    let outcome = Driver::new(&scoring, 2, &mut scorer, &mut store)
        .run_country("USA", &records)
        .unwrap();

    assert_eq!(outcome.stats.levels, 2);
    let masters: BTreeSet<u64> = outcome.masters.iter().map(|id| id.0).collect();
    assert_eq!(masters, BTreeSet::from([3, 4, 5, 6]));
    assert_eq!(master_of(&outcome, 1), 3);
    assert_eq!(master_of(&outcome, 2), 5);
    assert_eq!(outcome.ledger.get(RecordId(1)).unwrap().total_score, 7.0);
}

/// Deterministic pseudo-random scorer: a pair is a candidate when its ids
/// hash into the first bucket.
struct Hashed {
    modulus: u64,
}

impl Scorer for Hashed {
    fn score(&mut self, request: &ScoreRequest<'_>) -> Result<Vec<CandidatePair>, ScorerError> {
        let mut out = Vec::new();
        let mut consider = |c: &Record, m: &Record| {
            let h = c.id.0.wrapping_mul(31).wrapping_add(m.id.0.wrapping_mul(17));
            if h % self.modulus == 0 {
                out.push(candidate(c.id.0, m.id.0, 4.0 + (h % 4) as f64));
            }
        };
        match request.mode {
            ScoreMode::Dedup(records) => {
                for (i, c) in records.iter().enumerate() {
                    for m in &records[i + 1..] {
                        consider(c, m);
                        consider(m, c);
                    }
                }
            }
            ScoreMode::Linkage { left, right } => {
                for c in left {
                    for m in right {
                        consider(c, m);
                    }
                }
            }
        }
        Ok(out)
    }
}

proptest! {
    #[test]
    fn ledger_covers_every_record(n in 0u64..60, batch in 1usize..9, modulus in 2u64..6) {
        let records: Vec<Record> = (1..=n).map(|i| record(i, if i % 2 == 0 { "a" } else { "b" })).collect();
        let scoring = ScoringConfig::default();
        let mut scorer = Hashed { modulus };
        let mut store = MemoryStore::new();

        let outcome = Driver::new(&scoring, batch, &mut scorer, &mut store)
            .run_country("USA", &records)
            .unwrap();

        prop_assert_eq!(outcome.ledger.len(), records.len());
        let masters: BTreeSet<RecordId> = outcome.masters.iter().copied().collect();
        prop_assert_eq!(masters.len(), outcome.masters.len());
        for entry in outcome.ledger.entries() {
            prop_assert!(masters.contains(&entry.master_id));
        }
        for id in &masters {
            prop_assert_eq!(outcome.ledger.get(*id).unwrap().master_id, *id);
        }
    }
}
