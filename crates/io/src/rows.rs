//! CSV row shapes shared by score files, cross-references and scorer output.

use serde::{Deserialize, Serialize};
use sitemaster_core::{CandidatePair, CrossRefEntry, FieldScores, MatchLink, RecordId};

/// Record id column of master and scope files.
pub const ID_COLUMN: &str = "SR_NUM";

/// One scored pair: `SR_NUM_1` is the child, `SR_NUM_2` its master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    #[serde(rename = "SR_NUM_1")]
    pub child: u64,
    #[serde(rename = "SR_NUM_2")]
    pub master: u64,
    #[serde(rename = "SITE_NAME_COMPARISON_SCORE", default)]
    pub site_name: f64,
    #[serde(rename = "STATE_COMPARISON_SCORE", default)]
    pub state: f64,
    #[serde(rename = "CITY_COMPARISON_SCORE", default)]
    pub city: f64,
    #[serde(rename = "CONCAT_ADDRESS_COMPARISON_SCORE", default)]
    pub concat_address: f64,
    #[serde(rename = "POSTAL_CODE_COMPARISON_SCORE", default)]
    pub postal_code: f64,
    #[serde(rename = "NUM_OF_MATCHES_FOUND", default)]
    pub total: f64,
}

impl ScoreRow {
    fn new(child: RecordId, master: RecordId, s: &FieldScores, total: f64) -> Self {
        Self {
            child: child.0,
            master: master.0,
            site_name: s.site_name,
            state: s.state,
            city: s.city,
            concat_address: s.concat_address,
            postal_code: s.postal_code,
            total,
        }
    }

    /// The `0,0` row scorers emit when a comparison found nothing.
    pub fn is_sentinel(&self) -> bool {
        self.child == 0 && self.master == 0
    }

    pub fn scores(&self) -> FieldScores {
        FieldScores {
            site_name: self.site_name,
            state: self.state,
            city: self.city,
            concat_address: self.concat_address,
            postal_code: self.postal_code,
        }
    }

    pub fn into_candidate(self) -> CandidatePair {
        CandidatePair {
            child_id: RecordId(self.child),
            master_id: RecordId(self.master),
            scores: self.scores(),
            total_score: self.total,
        }
    }
}

impl From<&MatchLink> for ScoreRow {
    fn from(link: &MatchLink) -> Self {
        Self::new(link.child_id, link.master_id, &link.scores, link.total_score)
    }
}

impl From<&CrossRefEntry> for ScoreRow {
    fn from(entry: &CrossRefEntry) -> Self {
        Self::new(entry.record_id, entry.master_id, &entry.scores, entry.total_score)
    }
}
