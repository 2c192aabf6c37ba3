//! Pure cleaning functions: ingested row → comparable [`Record`].

use std::collections::BTreeMap;

use crate::model::{Field, Record, RecordId, SiteFields};

/// Column holding the country a site belongs to.
pub const COUNTRY_COLUMN: &str = "COUNTRY";

/// Which columns are lowercased and stripped, and which address lines are
/// joined into `CONCAT_ADDRESS`.
#[derive(Debug, Clone)]
pub struct CleaningRules {
    pub clean_columns: Vec<String>,
    pub address_lines: Vec<String>,
}

impl Default for CleaningRules {
    fn default() -> Self {
        let address_lines: Vec<String> = ["ADDRESS_LINE_1", "ADDRESS_LINE_2", "ADDRESS_LINE_3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut clean_columns = address_lines.clone();
        clean_columns.extend(
            ["SITE_NAME", "STATE", "CITY", "POSTAL_CODE"]
                .iter()
                .map(|s| s.to_string()),
        );
        Self {
            clean_columns,
            address_lines,
        }
    }
}

impl CleaningRules {
    fn cleans(&self, column: &str) -> bool {
        self.clean_columns.iter().any(|c| c == column)
    }

    fn is_address_line(&self, column: &str) -> bool {
        self.address_lines.iter().any(|c| c == column)
    }
}

/// Remove ASCII punctuation (`!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~`).
pub fn strip_punctuation(input: &str) -> String {
    input.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

/// Matching form of a value: punctuation removed, lowercased.
pub fn clean_text(input: &str) -> String {
    strip_punctuation(input).to_lowercase()
}

/// Join non-empty address parts with a single space.
pub fn concat_address<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Country names become file-name safe keys: trimmed, spaces to underscores.
pub fn country_key(raw: &str) -> String {
    raw.trim().replace(' ', "_")
}

/// Build a typed record from a row of standardized columns.
///
/// Missing columns read as empty strings. Columns that are neither a compared
/// field, an address line, nor the country are kept in `extra` untouched.
pub fn build_record(
    id: RecordId,
    row: &BTreeMap<String, String>,
    rules: &CleaningRules,
) -> Record {
    let value = |column: &str| row.get(column).map(|v| v.trim()).unwrap_or("");

    let mut fields = SiteFields::default();
    let mut display = SiteFields::default();

    for field in Field::ALL {
        if field == Field::ConcatAddress {
            continue;
        }
        let raw = value(field.column());
        display.set(field, raw.to_string());
        let cleaned = if rules.cleans(field.column()) {
            clean_text(raw)
        } else {
            raw.to_string()
        };
        fields.set(field, cleaned);
    }

    if rules.address_lines.is_empty() {
        let raw = value(Field::ConcatAddress.column());
        display.concat_address = raw.to_string();
        fields.concat_address = if rules.cleans(Field::ConcatAddress.column()) {
            clean_text(raw)
        } else {
            raw.to_string()
        };
    } else {
        display.concat_address = concat_address(rules.address_lines.iter().map(|c| value(c)));
        let cleaned_lines: Vec<String> = rules
            .address_lines
            .iter()
            .map(|c| {
                if rules.cleans(c) {
                    clean_text(value(c))
                } else {
                    value(c).to_string()
                }
            })
            .collect();
        fields.concat_address = concat_address(cleaned_lines.iter().map(String::as_str));
    }

    let extra = row
        .iter()
        .filter(|(k, _)| {
            Field::from_column(k).is_none() && !rules.is_address_line(k) && k.as_str() != COUNTRY_COLUMN
        })
        .map(|(k, v)| (k.clone(), v.trim().to_string()))
        .collect();

    Record {
        id,
        country: country_key(value(COUNTRY_COLUMN)),
        fields,
        display,
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn clean_text_strips_and_lowercases() {
        assert_eq!(clean_text("St. Mary's Hospital, Inc."), "st marys hospital inc");
        assert_eq!(clean_text("ÉCOLE-Clinic"), "écoleclinic");
    }

    #[test]
    fn concat_skips_blank_lines() {
        assert_eq!(concat_address(["12 Main St", "", "  Suite 4 "]), "12 Main St Suite 4");
        assert_eq!(concat_address(Vec::<&str>::new()), "");
    }

    #[test]
    fn country_key_replaces_spaces() {
        assert_eq!(country_key(" United States "), "United_States");
    }

    #[test]
    fn build_record_splits_display_and_normalized() {
        let r = row(&[
            ("SITE_NAME", "St. Mary's"),
            ("STATE", "AL"),
            ("CITY", "Dothan"),
            ("POSTAL_CODE", "36301"),
            ("ADDRESS_LINE_1", "1108 Ross Clark Circle"),
            ("ADDRESS_LINE_2", ""),
            ("ADDRESS_LINE_3", "Bldg. B"),
            ("COUNTRY", "United States"),
            ("PHONE_NUM", "3347938701"),
        ]);
        let rec = build_record(RecordId(7), &r, &CleaningRules::default());

        assert_eq!(rec.id, RecordId(7));
        assert_eq!(rec.country, "United_States");
        assert_eq!(rec.fields.site_name, "st marys");
        assert_eq!(rec.display.site_name, "St. Mary's");
        assert_eq!(rec.fields.state, "al");
        assert_eq!(rec.fields.concat_address, "1108 ross clark circle bldg b");
        assert_eq!(rec.display.concat_address, "1108 Ross Clark Circle Bldg. B");
        assert_eq!(rec.extra.get("PHONE_NUM").map(String::as_str), Some("3347938701"));
        assert!(!rec.extra.contains_key("ADDRESS_LINE_1"));
        assert!(!rec.extra.contains_key("COUNTRY"));
    }

    #[test]
    fn prebuilt_concat_address_is_used_without_lines() {
        let rules = CleaningRules {
            clean_columns: vec!["CONCAT_ADDRESS".into()],
            address_lines: vec![],
        };
        let r = row(&[("SITE_NAME", "Acme"), ("CONCAT_ADDRESS", "1 Elm St.")]);
        let rec = build_record(RecordId(1), &r, &rules);
        assert_eq!(rec.fields.concat_address, "1 elm st");
        // SITE_NAME not in clean_columns: kept verbatim
        assert_eq!(rec.fields.site_name, "Acme");
    }
}
