use serde::Serialize;

use crate::driver::{CountryOutcome, CountryStats};

/// What a pipeline run did, per country. Printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub engine_version: String,
    pub run_at: String,
    pub countries: Vec<CountrySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountrySummary {
    pub country: String,
    #[serde(flatten)]
    pub stats: CountryStats,
}

impl RunSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            countries: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: &CountryOutcome) {
        self.countries.push(CountrySummary {
            country: outcome.country.clone(),
            stats: outcome.stats.clone(),
        });
    }

    pub fn total_records(&self) -> usize {
        self.countries.iter().map(|c| c.stats.records).sum()
    }

    pub fn total_masters(&self) -> usize {
        self.countries.iter().map(|c| c.stats.masters).sum()
    }
}
