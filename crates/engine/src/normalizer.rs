//! Match normalization: raw candidate pairs → flat, chain-free match links.
//!
//! # Steps
//!
//! 1. **Top match.** One link per child: highest `total_score`, ties go to
//!    the smaller `master_id`. Self pairs are discarded.
//! 2. **Conflict drop.** For each id that is both a master and a child: if
//!    its best incoming score is strictly greater than its outgoing score and
//!    the two names differ, the outgoing link is flagged. Flagged links are
//!    removed together once every id has been judged, and the id stays a
//!    master.
//! 3. **Collapse.** Remaining links are fed strongest-first into a
//!    [`DisjointSet`]. A link that would close a cycle is the weakest link of
//!    that cycle and is dropped. Every child is then retargeted at its root,
//!    so the output never contains an id that is both child and master.

use std::collections::BTreeMap;

use log::{debug, warn};
use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use serde::Serialize;
use sitemaster_core::{CandidatePair, MatchLink, RecordId};

use crate::disjoint_set::DisjointSet;
use crate::error::EngineError;
use crate::scope::Scope;

/// Chains at least this long are reported as a data-quality warning.
pub const DEEP_CHAIN_HOPS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub candidates: usize,
    pub self_pairs: usize,
    pub top_matches: usize,
    pub dropped: usize,
    pub cycles_broken: usize,
    pub redirected: usize,
    pub max_chain_depth: usize,
    pub deep_chains: usize,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub links: Vec<MatchLink>,
    pub report: NormalizeReport,
}

/// Keep the single best candidate per child. Output is sorted by child id.
pub fn select_top_matches(candidates: impl IntoIterator<Item = CandidatePair>) -> Vec<MatchLink> {
    let mut best: BTreeMap<RecordId, MatchLink> = BTreeMap::new();
    for pair in candidates {
        if pair.child_id == pair.master_id {
            continue;
        }
        match best.get(&pair.child_id) {
            Some(current) if !beats(&pair, current) => {}
            _ => {
                best.insert(pair.child_id, pair.into());
            }
        }
    }
    best.into_values().collect()
}

fn beats(pair: &CandidatePair, current: &MatchLink) -> bool {
    let (new, old) = (OrderedFloat(pair.total_score), OrderedFloat(current.total_score));
    new > old || (new == old && pair.master_id < current.master_id)
}

/// Normalize one comparison's candidates against its scope.
///
/// Every id referenced by a candidate must belong to `scope`.
pub fn normalize(
    candidates: Vec<CandidatePair>,
    scope: &Scope<'_>,
) -> Result<Normalized, EngineError> {
    let mut report = NormalizeReport {
        candidates: candidates.len(),
        ..Default::default()
    };

    for pair in &candidates {
        for id in [pair.child_id, pair.master_id] {
            if !scope.contains(id) {
                return Err(EngineError::UnknownRecord {
                    scope: scope.label().to_string(),
                    id,
                });
            }
        }
    }
    report.self_pairs = candidates
        .iter()
        .filter(|p| p.child_id == p.master_id)
        .count();

    let top = select_top_matches(candidates);
    report.top_matches = top.len();

    let mut kept: BTreeMap<RecordId, MatchLink> =
        top.into_iter().map(|l| (l.child_id, l)).collect();

    report.dropped = drop_conflicting(&mut kept, scope);

    // Strongest first; among equal scores the larger child goes first, so a
    // tied cycle is broken at its smallest id.
    let mut ordered: Vec<MatchLink> = kept.into_values().collect();
    ordered.sort_by(|a, b| {
        OrderedFloat(b.total_score)
            .cmp(&OrderedFloat(a.total_score))
            .then(b.child_id.cmp(&a.child_id))
    });

    let mut forest = DisjointSet::new();
    let mut accepted: BTreeMap<RecordId, MatchLink> = BTreeMap::new();
    for link in ordered {
        if forest.union(link.child_id, link.master_id) {
            accepted.insert(link.child_id, link);
        } else {
            debug!(
                "{}: cycle closed by {} -> {} ({}), link dropped",
                scope.label(),
                link.child_id,
                link.master_id,
                link.total_score
            );
            report.cycles_broken += 1;
        }
    }

    let depths = chain_depths(&accepted);
    report.max_chain_depth = depths.values().copied().max().unwrap_or(0);
    report.deep_chains = depths.values().filter(|&&d| d >= DEEP_CHAIN_HOPS).count();
    if report.deep_chains > 0 {
        warn!(
            "{}: {} record(s) reached their master through {}+ hops (longest {}); collapsed to direct links",
            scope.label(),
            report.deep_chains,
            DEEP_CHAIN_HOPS,
            report.max_chain_depth
        );
    }

    let mut links = Vec::with_capacity(accepted.len());
    for (_, mut link) in accepted {
        let root = forest.find(link.child_id);
        if root != link.master_id {
            report.redirected += 1;
            link.master_id = root;
        }
        links.push(link);
    }

    Ok(Normalized { links, report })
}

/// Drop the outgoing link of every id whose strongest incoming link beats
/// it, when the two records it connects carry different names.
///
/// Every pivot is judged against the top-match set as it was on entry.
/// Flagged links are removed only after all pivots are judged.
fn drop_conflicting(kept: &mut BTreeMap<RecordId, MatchLink>, scope: &Scope<'_>) -> usize {
    let mut best_incoming: FxHashMap<RecordId, OrderedFloat<f64>> = FxHashMap::default();
    for link in kept.values() {
        let score = OrderedFloat(link.total_score);
        best_incoming
            .entry(link.master_id)
            .and_modify(|best| *best = (*best).max(score))
            .or_insert(score);
    }

    let flagged: Vec<RecordId> = kept
        .values()
        .filter_map(|outgoing| {
            let pivot = outgoing.child_id;
            let incoming = *best_incoming.get(&pivot)?;
            let names_differ = scope.site_name(pivot) != scope.site_name(outgoing.master_id);
            if incoming > OrderedFloat(outgoing.total_score) && names_differ {
                debug!(
                    "{}: dropping {} -> {} ({}), weaker than incoming {}",
                    scope.label(),
                    pivot,
                    outgoing.master_id,
                    outgoing.total_score,
                    incoming
                );
                Some(pivot)
            } else {
                None
            }
        })
        .collect();

    for pivot in &flagged {
        kept.remove(pivot);
    }
    flagged.len()
}

/// Hops from each child to its root in an acyclic link set.
fn chain_depths(links: &BTreeMap<RecordId, MatchLink>) -> FxHashMap<RecordId, usize> {
    let mut depths: FxHashMap<RecordId, usize> = FxHashMap::default();
    for &start in links.keys() {
        let mut path = Vec::new();
        let mut node = start;
        let mut base = 0;
        while let Some(link) = links.get(&node) {
            if let Some(&known) = depths.get(&node) {
                base = known;
                break;
            }
            path.push(node);
            node = link.master_id;
        }
        // `base` counts hops below the first memoized node; unwind the walk
        for (i, &n) in path.iter().rev().enumerate() {
            depths.insert(n, base + i + 1);
        }
    }
    depths
}
