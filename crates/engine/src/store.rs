//! Artifact persistence seam.
//!
//! The driver writes every intermediate and final artifact through an
//! [`ArtifactStore`] and reads master files back between levels. Artifact
//! names are fixed and country-scoped; see the `*_name` functions.

use std::collections::BTreeMap;
use std::fmt;

use sitemaster_core::{CrossRefEntry, MatchLink, Record, RecordId};

use crate::error::StoreError;
use crate::report::ReportRow;

/// Which master file: one per batch, then one per tournament slot per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MasterKey {
    Batch(usize),
    Level { depth: usize, slot: usize },
}

impl MasterKey {
    /// `"3"` for batch 3, `"d2_0"` for level 2 slot 0.
    pub fn tag(&self) -> String {
        match self {
            Self::Batch(i) => i.to_string(),
            Self::Level { depth, slot } => format!("d{depth}_{slot}"),
        }
    }
}

impl fmt::Display for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch(i) => write!(f, "batch {i}"),
            Self::Level { depth, slot } => write!(f, "depth {depth} slot {slot}"),
        }
    }
}

pub fn master_file_name(country: &str, key: MasterKey) -> String {
    format!("{country}_{}_Master.csv", key.tag())
}

pub fn level_cross_ref_name(country: &str, depth: usize) -> String {
    format!("{country}_d{depth}_Raw_Cross_Ref.csv")
}

pub fn cleaned_scores_name(country: &str, tag: &str) -> String {
    format!("{country}_{tag}_Cleaned_Feature_Scores.csv")
}

pub fn final_master_name(country: &str) -> String {
    format!("{country}_Master.csv")
}

pub fn final_cross_ref_name(country: &str) -> String {
    format!("{country}_Raw_Cross_Ref.csv")
}

pub fn report_name(country: &str) -> String {
    format!("{country}_Cross_Ref_Full_Report.csv")
}

/// Terminal artifacts of one country.
#[derive(Debug, Clone, Copy)]
pub struct FinalArtifacts<'a> {
    pub masters: &'a [&'a Record],
    pub cross_ref: &'a [CrossRefEntry],
    pub report: &'a [ReportRow],
}

pub trait ArtifactStore {
    fn write_master(
        &mut self,
        country: &str,
        key: MasterKey,
        records: &[&Record],
    ) -> Result<(), StoreError>;

    /// Record ids of a previously written master file, in file order.
    fn read_master(&self, country: &str, key: MasterKey) -> Result<Vec<RecordId>, StoreError>;

    fn write_cleaned_scores(
        &mut self,
        country: &str,
        tag: &str,
        links: &[MatchLink],
    ) -> Result<(), StoreError>;

    fn write_level_cross_ref(
        &mut self,
        country: &str,
        depth: usize,
        entries: &[CrossRefEntry],
    ) -> Result<(), StoreError>;

    fn write_final(&mut self, country: &str, artifacts: &FinalArtifacts<'_>)
        -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Keeps artifacts in maps keyed by their file names.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub masters: BTreeMap<String, Vec<RecordId>>,
    pub cleaned_scores: BTreeMap<String, Vec<MatchLink>>,
    pub level_cross_refs: BTreeMap<String, Vec<CrossRefEntry>>,
    pub final_cross_refs: BTreeMap<String, Vec<CrossRefEntry>>,
    pub reports: BTreeMap<String, Vec<ReportRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn master_ids(&self, name: &str) -> Option<&[RecordId]> {
        self.masters.get(name).map(|v| v.as_slice())
    }
}

impl ArtifactStore for MemoryStore {
    fn write_master(
        &mut self,
        country: &str,
        key: MasterKey,
        records: &[&Record],
    ) -> Result<(), StoreError> {
        self.masters.insert(
            master_file_name(country, key),
            records.iter().map(|r| r.id).collect(),
        );
        Ok(())
    }

    fn read_master(&self, country: &str, key: MasterKey) -> Result<Vec<RecordId>, StoreError> {
        let name = master_file_name(country, key);
        self.masters
            .get(&name)
            .cloned()
            .ok_or_else(|| StoreError::missing(name))
    }

    fn write_cleaned_scores(
        &mut self,
        country: &str,
        tag: &str,
        links: &[MatchLink],
    ) -> Result<(), StoreError> {
        self.cleaned_scores
            .insert(cleaned_scores_name(country, tag), links.to_vec());
        Ok(())
    }

    fn write_level_cross_ref(
        &mut self,
        country: &str,
        depth: usize,
        entries: &[CrossRefEntry],
    ) -> Result<(), StoreError> {
        self.level_cross_refs
            .insert(level_cross_ref_name(country, depth), entries.to_vec());
        Ok(())
    }

    fn write_final(
        &mut self,
        country: &str,
        artifacts: &FinalArtifacts<'_>,
    ) -> Result<(), StoreError> {
        self.masters.insert(
            final_master_name(country),
            artifacts.masters.iter().map(|r| r.id).collect(),
        );
        self.final_cross_refs
            .insert(final_cross_ref_name(country), artifacts.cross_ref.to_vec());
        self.reports
            .insert(report_name(country), artifacts.report.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreErrorKind;

    #[test]
    fn artifact_names() {
        assert_eq!(master_file_name("USA", MasterKey::Batch(3)), "USA_3_Master.csv");
        assert_eq!(
            master_file_name("USA", MasterKey::Level { depth: 2, slot: 0 }),
            "USA_d2_0_Master.csv"
        );
        assert_eq!(level_cross_ref_name("New_Zealand", 1), "New_Zealand_d1_Raw_Cross_Ref.csv");
        assert_eq!(cleaned_scores_name("USA", "d1_1"), "USA_d1_1_Cleaned_Feature_Scores.csv");
        assert_eq!(final_master_name("USA"), "USA_Master.csv");
        assert_eq!(final_cross_ref_name("USA"), "USA_Raw_Cross_Ref.csv");
        assert_eq!(report_name("USA"), "USA_Cross_Ref_Full_Report.csv");
    }

    #[test]
    fn memory_store_missing_master() {
        let store = MemoryStore::new();
        let err = store.read_master("USA", MasterKey::Batch(0)).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Missing);
        assert_eq!(err.path, "USA_0_Master.csv");
    }
}
