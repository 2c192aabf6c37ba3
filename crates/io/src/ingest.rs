//! Raw CSV → per-country typed records.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use log::{info, warn};
use sitemaster_config::InputConfig;
use sitemaster_core::normalize::{build_record, COUNTRY_COLUMN};
use sitemaster_core::{Record, RecordId};

use crate::error::IngestError;

/// One country's records, in input order.
#[derive(Debug, Clone)]
pub struct CountryRecords {
    pub country: String,
    pub records: Vec<Record>,
}

/// Read file and convert to UTF-8 if needed (Windows-1252 fallback).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IngestError> {
    let io_err = |e: std::io::Error| IngestError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Excel exports are commonly Windows-1252
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub fn load_records(path: &Path, input: &InputConfig) -> Result<Vec<CountryRecords>, IngestError> {
    let content = read_file_as_utf8(path)?;
    let countries = parse_records(&content, input)?;
    info!(
        "loaded {} records for {} countries from {}",
        countries.iter().map(|c| c.records.len()).sum::<usize>(),
        countries.len(),
        path.display()
    );
    Ok(countries)
}

/// Parse raw CSV text into records grouped by country (first-seen order).
///
/// Headers go through the rename map, cells are trimmed and short rows are
/// padded with empty values. The record id comes from `input.id_column`, or
/// the 1-based data row position when no id column is configured.
pub fn parse_records(content: &str, input: &InputConfig) -> Result<Vec<CountryRecords>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::Csv(e.to_string()))?
        .iter()
        .map(|h| {
            let h = h.trim().trim_start_matches('\u{feff}');
            input.rename.get(h).cloned().unwrap_or_else(|| h.to_string())
        })
        .collect();

    if let Some(id_column) = &input.id_column {
        if !headers.iter().any(|h| h == id_column) {
            return Err(IngestError::MissingColumn(id_column.clone()));
        }
    }
    if !headers.iter().any(|h| h == "SITE_NAME") {
        warn!("input has no SITE_NAME column; all names compare as empty");
    }

    let rules = input.cleaning_rules();
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();

    for (pos, row) in reader.records().enumerate() {
        let row = row.map_err(|e| IngestError::Csv(e.to_string()))?;
        let row_num = pos + 1;

        let mut cells: BTreeMap<String, String> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), row.get(i).unwrap_or("").trim().to_string()))
            .collect();

        let country = match cells.get(COUNTRY_COLUMN).filter(|c| !c.is_empty()) {
            Some(c) => c.clone(),
            None => input
                .country
                .clone()
                .ok_or(IngestError::NoCountry { row: row_num })?,
        };
        cells.insert(COUNTRY_COLUMN.to_string(), country);

        let id = match &input.id_column {
            Some(col) => {
                let raw = cells.get(col).map(String::as_str).unwrap_or("");
                raw.parse::<u64>().map_err(|_| IngestError::BadId {
                    row: row_num,
                    value: raw.to_string(),
                })?
            }
            None => row_num as u64,
        };

        let mut record = build_record(RecordId(id), &cells, &rules);
        if let Some(col) = &input.id_column {
            record.extra.remove(col);
        }
        let key = record.country.clone();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(record);
    }

    Ok(order
        .into_iter()
        .filter_map(|country| {
            groups
                .remove(&country)
                .map(|records| CountryRecords { country, records })
        })
        .collect())
}
