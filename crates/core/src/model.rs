use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable identity of a site record within its country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Comparable fields
// ---------------------------------------------------------------------------

/// The five fields the scorer compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Field {
    SiteName,
    State,
    City,
    ConcatAddress,
    PostalCode,
}

impl Field {
    /// Report column order.
    pub const ALL: [Field; 5] = [
        Field::SiteName,
        Field::State,
        Field::City,
        Field::ConcatAddress,
        Field::PostalCode,
    ];

    /// Standardized input column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::SiteName => "SITE_NAME",
            Self::State => "STATE",
            Self::City => "CITY",
            Self::ConcatAddress => "CONCAT_ADDRESS",
            Self::PostalCode => "POSTAL_CODE",
        }
    }

    pub fn from_column(name: &str) -> Option<Field> {
        Self::ALL.into_iter().find(|f| f.column() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFields {
    pub site_name: String,
    pub state: String,
    pub city: String,
    pub concat_address: String,
    pub postal_code: String,
}

impl SiteFields {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::SiteName => &self.site_name,
            Field::State => &self.state,
            Field::City => &self.city,
            Field::ConcatAddress => &self.concat_address,
            Field::PostalCode => &self.postal_code,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::SiteName => self.site_name = value,
            Field::State => self.state = value,
            Field::City => self.city = value,
            Field::ConcatAddress => self.concat_address = value,
            Field::PostalCode => self.postal_code = value,
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One ingested site. Never mutated after cleaning.
///
/// `fields` holds the normalized values the scorer compares; `display` keeps
/// the values as they arrived (case and punctuation intact) for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub country: String,
    pub fields: SiteFields,
    pub display: SiteFields,
    /// Passthrough attributes (phone, county, ownership, ...).
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Record {
    pub fn site_name(&self) -> &str {
        &self.fields.site_name
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Per-field comparison scores for one pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldScores {
    pub site_name: f64,
    pub state: f64,
    pub city: f64,
    pub concat_address: f64,
    pub postal_code: f64,
}

impl FieldScores {
    /// Scores of a record compared with itself: every field matches and the
    /// combined address carries the scaling factor.
    pub fn maximal(scaling_factor: f64) -> Self {
        Self {
            site_name: 1.0,
            state: 1.0,
            city: 1.0,
            concat_address: scaling_factor,
            postal_code: 1.0,
        }
    }

    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::SiteName => self.site_name,
            Field::State => self.state,
            Field::City => self.city,
            Field::ConcatAddress => self.concat_address,
            Field::PostalCode => self.postal_code,
        }
    }

    pub fn set(&mut self, field: Field, value: f64) {
        match field {
            Field::SiteName => self.site_name = value,
            Field::State => self.state = value,
            Field::City => self.city = value,
            Field::ConcatAddress => self.concat_address = value,
            Field::PostalCode => self.postal_code = value,
        }
    }

    pub fn total(&self) -> f64 {
        Field::ALL.iter().map(|f| self.get(*f)).sum()
    }
}

// ---------------------------------------------------------------------------
// Pairs, links, cross-references
// ---------------------------------------------------------------------------

/// Raw scorer output: `child_id` resembles `master_id` with these scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub child_id: RecordId,
    pub master_id: RecordId,
    pub scores: FieldScores,
    pub total_score: f64,
}

/// Normalized relationship: `child_id` is a duplicate of `master_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchLink {
    pub child_id: RecordId,
    pub master_id: RecordId,
    pub scores: FieldScores,
    pub total_score: f64,
}

impl MatchLink {
    /// Self link of maximal score, used for records that stay masters.
    pub fn identity(id: RecordId, scaling_factor: f64) -> Self {
        let scores = FieldScores::maximal(scaling_factor);
        Self {
            child_id: id,
            master_id: id,
            total_score: scores.total(),
            scores,
        }
    }

    pub fn is_self(&self) -> bool {
        self.child_id == self.master_id
    }
}

impl From<CandidatePair> for MatchLink {
    fn from(pair: CandidatePair) -> Self {
        Self {
            child_id: pair.child_id,
            master_id: pair.master_id,
            scores: pair.scores,
            total_score: pair.total_score,
        }
    }
}

/// One ledger row: where `record_id` currently points, and the evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRefEntry {
    pub record_id: RecordId,
    pub master_id: RecordId,
    pub scores: FieldScores,
    pub total_score: f64,
}

impl From<&MatchLink> for CrossRefEntry {
    fn from(link: &MatchLink) -> Self {
        Self {
            record_id: link.child_id,
            master_id: link.master_id,
            scores: link.scores,
            total_score: link.total_score,
        }
    }
}
