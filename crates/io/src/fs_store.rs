//! Filesystem artifact store.
//!
//! Staging master files and level cross-references go to the staging
//! directory, cleaned scores to the cleaned-scores directory, final
//! artifacts to the master-data directory. Every file is written to a
//! `.tmp` sibling first and renamed into place.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::debug;
use sitemaster_config::PathsConfig;
use sitemaster_core::{CrossRefEntry, Field, MatchLink, Record, RecordId};
use sitemaster_engine::store::{
    cleaned_scores_name, final_cross_ref_name, final_master_name, level_cross_ref_name,
    master_file_name, report_name,
};
use sitemaster_engine::{ArtifactStore, FinalArtifacts, MasterKey, StoreError, REPORT_COLUMNS};

use crate::rows::{ScoreRow, ID_COLUMN};

#[derive(Debug, Clone)]
pub struct FsStore {
    staging: PathBuf,
    cleaned_scores: PathBuf,
    master_data: PathBuf,
}

impl FsStore {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            staging: paths.staging.clone(),
            cleaned_scores: paths.cleaned_scores.clone(),
            master_data: paths.master_data.clone(),
        }
    }

    /// Create the output directories.
    pub fn prepare(&self) -> Result<(), StoreError> {
        for dir in [&self.staging, &self.cleaned_scores, &self.master_data] {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir.display().to_string(), e.to_string()))?;
        }
        Ok(())
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub fn master_data_dir(&self) -> &Path {
        &self.master_data
    }
}

impl ArtifactStore for FsStore {
    fn write_master(
        &mut self,
        country: &str,
        key: MasterKey,
        records: &[&Record],
    ) -> Result<(), StoreError> {
        let path = self.staging.join(master_file_name(country, key));
        write_records(&path, records)
    }

    fn read_master(&self, country: &str, key: MasterKey) -> Result<Vec<RecordId>, StoreError> {
        let path = self.staging.join(master_file_name(country, key));
        read_ids(&path)
    }

    fn write_cleaned_scores(
        &mut self,
        country: &str,
        tag: &str,
        links: &[MatchLink],
    ) -> Result<(), StoreError> {
        let path = self.cleaned_scores.join(cleaned_scores_name(country, tag));
        write_score_rows(&path, links.iter().map(ScoreRow::from))
    }

    fn write_level_cross_ref(
        &mut self,
        country: &str,
        depth: usize,
        entries: &[CrossRefEntry],
    ) -> Result<(), StoreError> {
        let path = self.staging.join(level_cross_ref_name(country, depth));
        write_score_rows(&path, entries.iter().map(ScoreRow::from))
    }

    fn write_final(
        &mut self,
        country: &str,
        artifacts: &FinalArtifacts<'_>,
    ) -> Result<(), StoreError> {
        write_records(
            &self.master_data.join(final_master_name(country)),
            artifacts.masters,
        )?;
        write_score_rows(
            &self.master_data.join(final_cross_ref_name(country)),
            artifacts.cross_ref.iter().map(ScoreRow::from),
        )?;

        let report_path = self.master_data.join(report_name(country));
        write_atomic(&report_path, |w| {
            w.write_record(REPORT_COLUMNS)?;
            for row in artifacts.report {
                w.write_record(row.cells())?;
            }
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn store_err(path: &Path, err: csv::Error) -> StoreError {
    let path = path.display().to_string();
    if err.is_io_error() {
        StoreError::io(path, err.to_string())
    } else {
        StoreError::format(path, err.to_string())
    }
}

/// Write through a CSV writer into `path.tmp`, then rename over `path`.
fn write_atomic<F>(path: &Path, fill: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut csv::Writer<BufWriter<File>>) -> Result<(), csv::Error>,
{
    let tmp_path = path.with_extension("csv.tmp");
    let io_err = |e: std::io::Error| StoreError::io(path.display().to_string(), e.to_string());

    let file = File::create(&tmp_path).map_err(io_err)?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    let result = fill(&mut writer).and_then(|_| writer.flush().map_err(csv::Error::from));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(store_err(path, e));
    }
    drop(writer);

    fs::rename(&tmp_path, path).map_err(io_err)?;
    debug!("wrote {}", path.display());
    Ok(())
}

fn write_score_rows(
    path: &Path,
    rows: impl Iterator<Item = ScoreRow>,
) -> Result<(), StoreError> {
    write_atomic(path, |w| {
        let mut empty = true;
        for row in rows {
            w.serialize(row)?;
            empty = false;
        }
        if empty {
            // serde writes no header without a row
            w.write_record(SCORE_HEADER)?;
        }
        Ok(())
    })
}

const SCORE_HEADER: [&str; 8] = [
    "SR_NUM_1",
    "SR_NUM_2",
    "SITE_NAME_COMPARISON_SCORE",
    "STATE_COMPARISON_SCORE",
    "CITY_COMPARISON_SCORE",
    "CONCAT_ADDRESS_COMPARISON_SCORE",
    "POSTAL_CODE_COMPARISON_SCORE",
    "NUM_OF_MATCHES_FOUND",
];

/// Master files: id, country, display fields, then passthrough columns.
fn write_records(path: &Path, records: &[&Record]) -> Result<(), StoreError> {
    let extra_columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.extra.keys().map(String::as_str))
        .collect();

    write_atomic(path, |w| {
        let mut header = vec![ID_COLUMN, "COUNTRY"];
        header.extend(Field::ALL.iter().map(|f| f.column()));
        header.extend(extra_columns.iter().copied());
        w.write_record(&header)?;

        for record in records {
            let mut row = vec![record.id.to_string(), record.country.clone()];
            row.extend(Field::ALL.iter().map(|&f| record.display.get(f).to_string()));
            row.extend(
                extra_columns
                    .iter()
                    .map(|c| record.extra.get(*c).cloned().unwrap_or_default()),
            );
            w.write_record(&row)?;
        }
        Ok(())
    })
}

fn read_ids(path: &Path) -> Result<Vec<RecordId>, StoreError> {
    let shown = path.display().to_string();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::missing(shown))
        }
        Err(e) => return Err(StoreError::io(shown, e.to_string())),
    };

    let mut reader = csv::Reader::from_reader(file);
    let idx = reader
        .headers()
        .map_err(|e| store_err(path, e))?
        .iter()
        .position(|h| h == ID_COLUMN)
        .ok_or_else(|| StoreError::format(shown.clone(), format!("no {ID_COLUMN} column")))?;

    let mut ids = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| store_err(path, e))?;
        let raw = row.get(idx).unwrap_or("");
        let id = raw
            .parse::<u64>()
            .map_err(|_| StoreError::format(shown.clone(), format!("bad {ID_COLUMN} '{raw}'")))?;
        ids.push(RecordId(id));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemaster_core::{FieldScores, SiteFields};
    use sitemaster_engine::StoreErrorKind;
    use tempfile::tempdir;

    fn store_in(root: &Path) -> FsStore {
        let store = FsStore::new(&PathsConfig::default().resolve_against(root));
        store.prepare().unwrap();
        store
    }

    fn record(id: u64, name: &str, phone: Option<&str>) -> Record {
        let mut extra = std::collections::BTreeMap::new();
        if let Some(p) = phone {
            extra.insert("PHONE".to_string(), p.to_string());
        }
        Record {
            id: RecordId(id),
            country: "USA".into(),
            fields: SiteFields::default(),
            display: SiteFields {
                site_name: name.into(),
                ..Default::default()
            },
            extra,
        }
    }

    #[test]
    fn master_file_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let a = record(12, "Mercy, Inc.", Some("555"));
        let b = record(3, "Agnes", None);

        store
            .write_master("USA", MasterKey::Level { depth: 1, slot: 0 }, &[&a, &b])
            .unwrap();
        let path = dir
            .path()
            .join("Master_Data/Recursive_Staging_Area/USA_d1_0_Master.csv");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("SR_NUM,COUNTRY,SITE_NAME,STATE,CITY,CONCAT_ADDRESS,POSTAL_CODE,PHONE"));
        assert!(text.contains("\"Mercy, Inc.\""));
        assert!(!path.with_extension("csv.tmp").exists());

        let ids = store
            .read_master("USA", MasterKey::Level { depth: 1, slot: 0 })
            .unwrap();
        assert_eq!(ids, vec![RecordId(12), RecordId(3)]);
    }

    #[test]
    fn missing_master_is_distinguishable() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let err = store.read_master("USA", MasterKey::Batch(9)).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Missing);
    }

    #[test]
    fn corrupt_master_is_format_error() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(
            store.staging_dir().join("USA_0_Master.csv"),
            "SR_NUM,SITE_NAME\nabc,Mercy\n",
        )
        .unwrap();
        let err = store.read_master("USA", MasterKey::Batch(0)).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Format);
    }

    #[test]
    fn unwritable_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let mut store = FsStore::new(&PathsConfig::default().resolve_against(&dir.path().join("absent")));
        let err = store
            .write_master("USA", MasterKey::Batch(0), &[])
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Io);
    }

    #[test]
    fn empty_cross_ref_still_has_header() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.write_level_cross_ref("USA", 2, &[]).unwrap();
        let text = fs::read_to_string(store.staging_dir().join("USA_d2_Raw_Cross_Ref.csv")).unwrap();
        assert_eq!(text.trim(), SCORE_HEADER.join(","));
    }

    #[test]
    fn final_artifacts_are_written() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let a = record(1, "Mercy", None);
        let entry = CrossRefEntry {
            record_id: RecordId(1),
            master_id: RecordId(1),
            scores: FieldScores::maximal(3.0),
            total_score: 7.0,
        };
        let report = sitemaster_engine::report::assemble_report([&entry], &[a.clone()]);

        store
            .write_final(
                "USA",
                &FinalArtifacts {
                    masters: &[&a],
                    cross_ref: &[entry],
                    report: &report,
                },
            )
            .unwrap();

        let root = store.master_data_dir();
        assert!(root.join("USA_Master.csv").exists());
        let xref = fs::read_to_string(root.join("USA_Raw_Cross_Ref.csv")).unwrap();
        assert_eq!(xref.lines().nth(1).unwrap(), "1,1,1.0,1.0,1.0,3.0,1.0,7.0");
        let full = fs::read_to_string(root.join("USA_Cross_Ref_Full_Report.csv")).unwrap();
        assert!(full.starts_with("SR_NUM_1,SR_NUM_2,SITE_NAME_1,SITE_NAME_2"));
        assert!(full.lines().nth(1).unwrap().starts_with("1,1,Mercy,Mercy,1,"));
    }
}
