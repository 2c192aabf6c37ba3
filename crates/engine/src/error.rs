use std::fmt;

use sitemaster_core::RecordId;

// ---------------------------------------------------------------------------
// Artifact store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Filesystem failure (permission, disk full, file locked). Often retryable.
    Io,
    /// Artifact exists but cannot be encoded or decoded.
    Format,
    /// Artifact was never written.
    Missing,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "io"),
            Self::Format => write!(f, "format"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

#[derive(Debug)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub path: String,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Io, path, message)
    }

    pub fn format(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Format, path, message)
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Missing, path, "artifact not found")
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error on '{}': {}", self.kind, self.path, self.message)
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ScorerError {
    /// Scorer process could not be started (or its inputs could not be staged).
    Spawn(String),
    /// Scorer exited with a non-zero status.
    Exit { code: Option<i32>, stderr: String },
    /// Scorer did not finish within the configured timeout.
    Timeout { seconds: u64 },
    /// Scorer output missing or malformed.
    Output(String),
}

impl fmt::Display for ScorerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(msg) => write!(f, "cannot start scorer: {msg}"),
            Self::Exit { code: Some(code), stderr } => {
                write!(f, "scorer failed (exit {code}): {stderr}")
            }
            Self::Exit { code: None, stderr } => {
                write!(f, "scorer terminated by signal: {stderr}")
            }
            Self::Timeout { seconds } => write!(f, "scorer timed out after {seconds}s"),
            Self::Output(msg) => write!(f, "bad scorer output: {msg}"),
        }
    }
}

impl std::error::Error for ScorerError {}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum EngineError {
    /// Invalid run parameter (zero batch size, ...).
    Config(String),
    /// Two input records of one country share an id.
    DuplicateRecord { country: String, id: RecordId },
    /// A candidate pair or link references an id outside its comparison scope.
    UnknownRecord { scope: String, id: RecordId },
    /// Scorer failed for one comparison; the country's reduction is aborted.
    Scorer { comparison: String, source: ScorerError },
    /// Artifact could not be written or read back.
    Store(StoreError),
    /// Cross-reference invariant broken.
    Ledger(String),
    /// More than one master file left after the last level.
    ReductionIncomplete { country: String, remaining: usize },
    /// Run cancelled between comparisons.
    Cancelled { country: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid run parameter: {msg}"),
            Self::DuplicateRecord { country, id } => {
                write!(f, "{country}: record id {id} appears more than once")
            }
            Self::UnknownRecord { scope, id } => {
                write!(f, "{scope}: record {id} is not part of this comparison")
            }
            Self::Scorer { comparison, source } => write!(f, "{comparison}: {source}"),
            Self::Store(err) => write!(f, "artifact store: {err}"),
            Self::Ledger(msg) => write!(f, "cross-reference ledger: {msg}"),
            Self::ReductionIncomplete { country, remaining } => write!(
                f,
                "{country}: reduction ended with {remaining} master files instead of 1"
            ),
            Self::Cancelled { country } => write!(f, "{country}: run cancelled"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Scorer { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
