//! Recursive reduction of one country's records to a single master file.
//!
//! # Stages
//!
//! 1. **Batching.** Records are partitioned into batches of at most
//!    `max_batch_size`. Each batch is deduplicated (scorer, normalizer,
//!    resolver), its master file persisted, and the ledger seeded.
//! 2. **Reducing.** For depth `1..=d` the queue of master files is consumed
//!    pairwise. Two files are linked and reduced into one; an unpaired file
//!    passes through untouched. After each depth the level cross-reference
//!    is persisted and folded into the ledger.
//! 3. **Terminal.** Exactly one master file must remain. The ledger is
//!    checked against it and the final artifacts are written.
//!
//! The driver never holds more than two master files' records in a single
//! scorer call.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::Serialize;
use sitemaster_config::ScoringConfig;
use sitemaster_core::{CrossRefEntry, MatchLink, Record, RecordId};

use crate::error::EngineError;
use crate::ledger::Ledger;
use crate::masters::resolve_masters;
use crate::normalizer::{normalize, NormalizeReport};
use crate::partition::{partition, reduction_depth};
use crate::report::{assemble_report, ReportRow};
use crate::scope::Scope;
use crate::scorer::{ScoreMode, ScoreRequest, Scorer};
use crate::store::{ArtifactStore, FinalArtifacts, MasterKey};

/// Shared cancellation flag, checked before every comparison.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountryStats {
    pub records: usize,
    pub batches: usize,
    pub levels: usize,
    pub scorer_calls: usize,
    /// Normalized links across all comparisons.
    pub links: usize,
    pub masters: usize,
    pub dropped_links: usize,
    pub cycles_broken: usize,
    pub redirected_links: usize,
    pub max_chain_depth: usize,
}

impl CountryStats {
    fn absorb(&mut self, report: &NormalizeReport, links: usize) {
        self.links += links;
        self.dropped_links += report.dropped;
        self.cycles_broken += report.cycles_broken;
        self.redirected_links += report.redirected;
        self.max_chain_depth = self.max_chain_depth.max(report.max_chain_depth);
    }
}

#[derive(Debug, Clone)]
pub struct CountryOutcome {
    pub country: String,
    /// Final master ids, in master-file order.
    pub masters: Vec<RecordId>,
    pub ledger: Ledger,
    pub report: Vec<ReportRow>,
    pub stats: CountryStats,
}

/// Result of reducing one comparison scope.
struct Reduced {
    links: Vec<MatchLink>,
    masters: BTreeSet<RecordId>,
}

pub struct Driver<'a> {
    scoring: &'a ScoringConfig,
    max_batch_size: usize,
    scorer: &'a mut dyn Scorer,
    store: &'a mut dyn ArtifactStore,
    cancel: CancelToken,
}

impl<'a> Driver<'a> {
    pub fn new(
        scoring: &'a ScoringConfig,
        max_batch_size: usize,
        scorer: &'a mut dyn Scorer,
        store: &'a mut dyn ArtifactStore,
    ) -> Self {
        Self {
            scoring,
            max_batch_size,
            scorer,
            store,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run_country(
        &mut self,
        country: &str,
        records: &[Record],
    ) -> Result<CountryOutcome, EngineError> {
        let mut index: FxHashMap<RecordId, &Record> = FxHashMap::default();
        for record in records {
            if index.insert(record.id, record).is_some() {
                return Err(EngineError::DuplicateRecord {
                    country: country.to_string(),
                    id: record.id,
                });
            }
        }

        let batches = partition(records, self.max_batch_size)?;
        let depth = reduction_depth(batches.len());
        let mut stats = CountryStats {
            records: records.len(),
            batches: batches.len(),
            levels: depth,
            ..Default::default()
        };
        info!(
            "{country}: {} records in {} batches, {depth} reduction levels",
            records.len(),
            batches.len()
        );

        // -- Batching --
        let mut ledger = Ledger::new();
        let mut queue: Vec<MasterKey> = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            let key = MasterKey::Batch(i);
            let scope = Scope::new(format!("{country} {key}"), batch.iter());

            let reduced = if scope.records().len() == 1 {
                // Single record: its own master, no scorer call
                Reduced {
                    links: Vec::new(),
                    masters: scope.ids(),
                }
            } else {
                self.reduce(country, key, &scope, ScoreMode::Dedup(scope.records()), &mut stats)?
            };

            let master_records = scope.select(&reduced.masters);
            self.store.write_master(country, key, &master_records)?;
            ledger.register_comparison(&reduced.masters, &reduced.links, self.scoring.scaling_factor)?;
            queue.push(key);
        }

        // -- Reducing --
        for level in 1..=depth {
            let mut next: Vec<MasterKey> = Vec::with_capacity(queue.len().div_ceil(2));
            let mut level_links: Vec<MatchLink> = Vec::new();
            let mut level_entries: Vec<CrossRefEntry> = Vec::new();

            for (slot, pair) in queue.chunks(2).enumerate() {
                let key = MasterKey::Level { depth: level, slot };
                let label = format!("{country} {key}");

                let masters = if let [left_key, right_key] = pair {
                    let left = self.hydrate(country, *left_key, &index)?;
                    let right = self.hydrate(country, *right_key, &index)?;
                    let scope = Scope::new(label, left.iter().copied().chain(right.iter().copied()));
                    let mode = ScoreMode::Linkage {
                        left: &left,
                        right: &right,
                    };
                    let reduced = self.reduce(country, key, &scope, mode, &mut stats)?;

                    let master_records = scope.select(&reduced.masters);
                    self.store.write_master(country, key, &master_records)?;
                    level_entries.extend(reduced.links.iter().map(CrossRefEntry::from));
                    level_links.extend(reduced.links);
                    reduced.masters
                } else {
                    let passed = self.hydrate(country, pair[0], &index)?;
                    debug!("{label}: {} passes through unpaired", pair[0]);
                    self.store.write_master(country, key, &passed)?;
                    passed.iter().map(|r| r.id).collect()
                };

                level_entries.extend(
                    masters
                        .iter()
                        .map(|&id| CrossRefEntry::from(&MatchLink::identity(id, self.scoring.scaling_factor))),
                );
                next.push(key);
            }

            level_entries.sort_by_key(|e| e.record_id);
            self.store.write_level_cross_ref(country, level, &level_entries)?;
            ledger = ledger.merged(&level_links);
            info!(
                "{country}: depth {level} done, {} -> {} master files, {} links",
                queue.len(),
                next.len(),
                level_links.len()
            );
            queue = next;
        }

        // -- Terminal --
        let final_records: Vec<&Record> = match queue.as_slice() {
            [] => Vec::new(),
            [last] => self.hydrate(country, *last, &index)?,
            _ => {
                return Err(EngineError::ReductionIncomplete {
                    country: country.to_string(),
                    remaining: queue.len(),
                })
            }
        };
        let masters: Vec<RecordId> = final_records.iter().map(|r| r.id).collect();
        let master_set: BTreeSet<RecordId> = masters.iter().copied().collect();
        ledger.verify(&master_set)?;
        if ledger.len() != records.len() {
            return Err(EngineError::Ledger(format!(
                "{country}: {} entries for {} records",
                ledger.len(),
                records.len()
            )));
        }

        let report = assemble_report(ledger.entries(), records);
        let cross_ref = ledger.to_vec();
        self.store.write_final(
            country,
            &FinalArtifacts {
                masters: &final_records,
                cross_ref: &cross_ref,
                report: &report,
            },
        )?;

        stats.masters = masters.len();
        info!(
            "{country}: {} records -> {} masters ({} scorer calls)",
            stats.records, stats.masters, stats.scorer_calls
        );

        Ok(CountryOutcome {
            country: country.to_string(),
            masters,
            ledger,
            report,
            stats,
        })
    }

    /// Score, normalize and resolve one comparison scope.
    fn reduce(
        &mut self,
        country: &str,
        key: MasterKey,
        scope: &Scope<'_>,
        mode: ScoreMode<'_>,
        stats: &mut CountryStats,
    ) -> Result<Reduced, EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled {
                country: country.to_string(),
            });
        }

        let tag = key.tag();
        let request = ScoreRequest {
            country,
            label: &tag,
            mode,
            scoring: self.scoring,
        };
        let candidates = self
            .scorer
            .score(&request)
            .map_err(|source| EngineError::Scorer {
                comparison: scope.label().to_string(),
                source,
            })?;
        stats.scorer_calls += 1;

        let normalized = normalize(candidates, scope)?;
        let masters = resolve_masters(scope.label(), &scope.ids(), &normalized.links)?;
        stats.absorb(&normalized.report, normalized.links.len());

        if !normalized.links.is_empty() {
            self.store
                .write_cleaned_scores(country, &tag, &normalized.links)?;
        }
        debug!(
            "{}: {} records -> {} masters ({} candidates, {} links, {} dropped)",
            scope.label(),
            scope.records().len(),
            masters.len(),
            normalized.report.candidates,
            normalized.links.len(),
            normalized.report.dropped
        );

        Ok(Reduced {
            links: normalized.links,
            masters,
        })
    }

    /// Read a master file back and resolve its ids to input records.
    fn hydrate<'r>(
        &self,
        country: &str,
        key: MasterKey,
        index: &FxHashMap<RecordId, &'r Record>,
    ) -> Result<Vec<&'r Record>, EngineError> {
        self.store
            .read_master(country, key)?
            .into_iter()
            .map(|id| {
                index.get(&id).copied().ok_or_else(|| EngineError::UnknownRecord {
                    scope: format!("{country} {key}"),
                    id,
                })
            })
            .collect()
    }
}
