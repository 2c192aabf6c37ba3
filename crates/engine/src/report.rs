//! Full cross-reference report: each ledger entry joined with the display
//! attributes of both the record and its master.

use rustc_hash::FxHashMap;
use serde::Serialize;
use sitemaster_core::{CrossRefEntry, Field, FieldScores, Record, RecordId, SiteFields};

/// Column order of the full report.
pub const REPORT_COLUMNS: [&str; 18] = [
    "SR_NUM_1",
    "SR_NUM_2",
    "SITE_NAME_1",
    "SITE_NAME_2",
    "SITE_NAME_COMPARISON_SCORE",
    "STATE_1",
    "STATE_2",
    "STATE_COMPARISON_SCORE",
    "CITY_1",
    "CITY_2",
    "CITY_COMPARISON_SCORE",
    "CONCAT_ADDRESS_1",
    "CONCAT_ADDRESS_2",
    "CONCAT_ADDRESS_COMPARISON_SCORE",
    "POSTAL_CODE_1",
    "POSTAL_CODE_2",
    "POSTAL_CODE_COMPARISON_SCORE",
    "NUM_OF_MATCHES_FOUND",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub child_id: RecordId,
    pub master_id: RecordId,
    /// `None` when the id has no known attributes (left join miss).
    pub child: Option<SiteFields>,
    pub master: Option<SiteFields>,
    pub scores: FieldScores,
    pub total_score: f64,
}

impl ReportRow {
    /// Cells in [`REPORT_COLUMNS`] order. Missing attributes are empty.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(REPORT_COLUMNS.len());
        cells.push(self.child_id.to_string());
        cells.push(self.master_id.to_string());
        for field in Field::ALL {
            cells.push(attr(&self.child, field));
            cells.push(attr(&self.master, field));
            cells.push(score_cell(self.scores.get(field)));
        }
        cells.push(score_cell(self.total_score));
        cells
    }
}

/// Same float text the csv serializer writes for the cross-reference files.
fn score_cell(score: f64) -> String {
    format!("{score:?}")
}

fn attr(side: &Option<SiteFields>, field: Field) -> String {
    side.as_ref()
        .map(|s| s.get(field).to_string())
        .unwrap_or_default()
}

/// Left join of the ledger with record display attributes, ordered by
/// record id.
pub fn assemble_report<'a>(
    entries: impl IntoIterator<Item = &'a CrossRefEntry>,
    records: &[Record],
) -> Vec<ReportRow> {
    let by_id: FxHashMap<RecordId, &Record> = records.iter().map(|r| (r.id, r)).collect();
    let lookup = |id: RecordId| by_id.get(&id).map(|r| r.display.clone());

    let mut rows: Vec<ReportRow> = entries
        .into_iter()
        .map(|e| ReportRow {
            child_id: e.record_id,
            master_id: e.master_id,
            child: lookup(e.record_id),
            master: lookup(e.master_id),
            scores: e.scores,
            total_score: e.total_score,
        })
        .collect();
    rows.sort_by_key(|r| r.child_id);
    rows
}
