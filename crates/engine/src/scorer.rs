//! Similarity scoring seam.
//!
//! The driver asks a [`Scorer`] for candidate pairs once per comparison.
//! [`SimilarityScorer`] is the in-process implementation; an external
//! process scorer lives in `sitemaster-io`.

use sitemaster_config::ScoringConfig;
use sitemaster_core::{CandidatePair, Field, FieldScores, Record};

use crate::error::ScorerError;

#[derive(Debug, Clone, Copy)]
pub enum ScoreMode<'a> {
    /// Every pair inside one batch. The earlier record is the child.
    Dedup(&'a [&'a Record]),
    /// Every left × right pair. The left record is the child.
    Linkage {
        left: &'a [&'a Record],
        right: &'a [&'a Record],
    },
}

impl ScoreMode<'_> {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Dedup(_) => "dedup",
            Self::Linkage { .. } => "linkage",
        }
    }

    pub fn record_count(&self) -> usize {
        match self {
            Self::Dedup(records) => records.len(),
            Self::Linkage { left, right } => left.len() + right.len(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub country: &'a str,
    /// Artifact tag of the comparison (`"3"`, `"d2_0"`).
    pub label: &'a str,
    pub mode: ScoreMode<'a>,
    pub scoring: &'a ScoringConfig,
}

pub trait Scorer {
    /// Candidate pairs for one comparison. An empty result means no
    /// duplicates; any failure is an error, never an empty result.
    fn score(&mut self, request: &ScoreRequest<'_>) -> Result<Vec<CandidatePair>, ScorerError>;
}

/// In-process scorer over normalized Levenshtein similarity.
///
/// Each field scores 1 when its similarity reaches the field threshold and
/// 0 otherwise; empty values never match. The combined address score is
/// multiplied by the scaling factor. Pairs whose total reaches the total
/// threshold are returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimilarityScorer;

impl SimilarityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn compare(child: &Record, master: &Record, scoring: &ScoringConfig) -> FieldScores {
        let mut scores = FieldScores::default();
        for field in Field::ALL {
            let a = child.fields.get(field);
            let b = master.fields.get(field);
            if a.is_empty() || b.is_empty() {
                continue;
            }
            if strsim::normalized_levenshtein(a, b) >= scoring.threshold(field) {
                let weight = if field == Field::ConcatAddress {
                    scoring.scaling_factor
                } else {
                    1.0
                };
                scores.set(field, weight);
            }
        }
        scores
    }

    fn candidate(child: &Record, master: &Record, scoring: &ScoringConfig) -> Option<CandidatePair> {
        let scores = Self::compare(child, master, scoring);
        let total_score = scores.total();
        (total_score >= scoring.total_threshold).then(|| CandidatePair {
            child_id: child.id,
            master_id: master.id,
            scores,
            total_score,
        })
    }
}

impl Scorer for SimilarityScorer {
    fn score(&mut self, request: &ScoreRequest<'_>) -> Result<Vec<CandidatePair>, ScorerError> {
        let scoring = request.scoring;
        let mut out = Vec::new();
        match request.mode {
            ScoreMode::Dedup(records) => {
                for (i, child) in records.iter().enumerate() {
                    for master in &records[i + 1..] {
                        out.extend(Self::candidate(child, master, scoring));
                    }
                }
            }
            ScoreMode::Linkage { left, right } => {
                for child in left {
                    for master in right {
                        out.extend(Self::candidate(child, master, scoring));
                    }
                }
            }
        }
        Ok(out)
    }
}
