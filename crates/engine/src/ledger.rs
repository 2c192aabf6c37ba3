//! Per-country cross-reference: every record ever seen → its current master.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use sitemaster_core::{CrossRefEntry, MatchLink, RecordId};

use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: BTreeMap<RecordId, CrossRefEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&CrossRefEntry> {
        self.entries.get(&id)
    }

    /// Entries ordered by record id.
    pub fn entries(&self) -> impl Iterator<Item = &CrossRefEntry> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<CrossRefEntry> {
        self.entries.values().cloned().collect()
    }

    /// Add a record seen for the first time. A second registration of the
    /// same id is an error: each record enters the ledger exactly once.
    pub fn register(&mut self, entry: CrossRefEntry) -> Result<(), EngineError> {
        if self.entries.contains_key(&entry.record_id) {
            return Err(EngineError::Ledger(format!(
                "record {} registered twice",
                entry.record_id
            )));
        }
        self.entries.insert(entry.record_id, entry);
        Ok(())
    }

    /// Seed the ledger from one batch: a maximal self entry for each master
    /// and the link entry for each child.
    pub fn register_comparison(
        &mut self,
        masters: &BTreeSet<RecordId>,
        links: &[MatchLink],
        scaling_factor: f64,
    ) -> Result<(), EngineError> {
        for &id in masters {
            self.register(CrossRefEntry::from(&MatchLink::identity(id, scaling_factor)))?;
        }
        for link in links.iter().filter(|l| !l.is_self()) {
            self.register(CrossRefEntry::from(link))?;
        }
        Ok(())
    }

    /// Left merge of one level's links.
    ///
    /// Every entry currently pointing at a link's child is repointed at that
    /// link's master and takes the link's scores. Self links are ignored and
    /// no rows are added or removed.
    pub fn merged(&self, links: &[MatchLink]) -> Ledger {
        let by_child: FxHashMap<RecordId, &MatchLink> = links
            .iter()
            .filter(|l| !l.is_self())
            .map(|l| (l.child_id, l))
            .collect();

        let entries = self
            .entries
            .iter()
            .map(|(&id, entry)| {
                let updated = match by_child.get(&entry.master_id) {
                    Some(link) => CrossRefEntry {
                        record_id: id,
                        master_id: link.master_id,
                        scores: link.scores,
                        total_score: link.total_score,
                    },
                    None => entry.clone(),
                };
                (id, updated)
            })
            .collect();

        Ledger { entries }
    }

    /// Every entry must point at a member of `masters`.
    pub fn verify(&self, masters: &BTreeSet<RecordId>) -> Result<(), EngineError> {
        let stray: Vec<String> = self
            .entries
            .values()
            .filter(|e| !masters.contains(&e.master_id))
            .take(5)
            .map(|e| format!("{} -> {}", e.record_id, e.master_id))
            .collect();
        if stray.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Ledger(format!(
                "entries point outside the master set: {}",
                stray.join(", ")
            )))
        }
    }
}
