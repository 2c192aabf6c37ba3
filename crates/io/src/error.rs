use std::fmt;

#[derive(Debug)]
pub enum IngestError {
    /// Input file could not be read.
    Io { path: String, message: String },
    /// Malformed CSV.
    Csv(String),
    /// Configured column absent from the header.
    MissingColumn(String),
    /// Id column value is not a non-negative integer.
    BadId { row: usize, value: String },
    /// Row has no country and no default country is configured.
    NoCountry { row: usize },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot read '{path}': {message}"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::MissingColumn(col) => write!(f, "missing column '{col}'"),
            Self::BadId { row, value } => {
                write!(f, "row {row}: record id '{value}' is not a non-negative integer")
            }
            Self::NoCountry { row } => write!(
                f,
                "row {row}: no COUNTRY value and no input.country default"
            ),
        }
    }
}

impl std::error::Error for IngestError {}
