use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use sitemaster_core::{Record, RecordId};

/// The records taking part in one comparison (one batch, or two master
/// files side by side), in the order they were supplied.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    label: String,
    records: Vec<&'a Record>,
    index: FxHashMap<RecordId, usize>,
}

impl<'a> Scope<'a> {
    pub fn new(label: impl Into<String>, records: impl IntoIterator<Item = &'a Record>) -> Self {
        let records: Vec<&'a Record> = records.into_iter().collect();
        let index = records
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.id, pos))
            .collect();
        Self {
            label: label.into(),
            records,
            index,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn records(&self) -> &[&'a Record] {
        &self.records
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: RecordId) -> Option<&'a Record> {
        self.index.get(&id).map(|&pos| self.records[pos])
    }

    pub fn site_name(&self, id: RecordId) -> Option<&'a str> {
        self.get(id).map(|r| r.site_name())
    }

    pub fn ids(&self) -> BTreeSet<RecordId> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Records whose id is in `keep`, in scope order.
    pub fn select(&self, keep: &BTreeSet<RecordId>) -> Vec<&'a Record> {
        self.records
            .iter()
            .copied()
            .filter(|r| keep.contains(&r.id))
            .collect()
    }
}
