//! CLI Exit Code Registry
//!
//! Single source of truth for `sitemaster` exit codes. Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                 |
//! |---------|-----------|---------------------------------------------|
//! | 0       | Universal | Success                                     |
//! | 1       | Universal | General error (unspecified)                 |
//! | 2       | Universal | CLI usage error (bad args)                  |
//! | 3-9     | config    | Pipeline config cannot be read or is invalid|
//! | 10-19   | input     | Raw input file problems                     |
//! | 20-29   | engine    | Scorer, artifact store, reduction failures  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use sitemaster_engine::{EngineError, StoreErrorKind};

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments (e.g. unknown `--country`).
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (3-9)
// =============================================================================

/// Config file missing or unreadable.
pub const EXIT_CONFIG_READ: u8 = 3;

/// Config parses but fails validation, or TOML is malformed.
pub const EXIT_CONFIG_INVALID: u8 = 4;

// =============================================================================
// Input (10-19)
// =============================================================================

/// Input file missing or unreadable.
pub const EXIT_INPUT_READ: u8 = 10;

/// Input file malformed (bad CSV, bad record id, no country).
pub const EXIT_INPUT_PARSE: u8 = 11;

// =============================================================================
// Engine (20-29)
// =============================================================================

/// Scorer could not start, failed, timed out, or returned bad output.
pub const EXIT_SCORER: u8 = 20;

/// Artifact could not be written (disk, permissions). Often retryable.
pub const EXIT_STORE_IO: u8 = 21;

/// Artifact exists but is malformed or missing where expected.
pub const EXIT_STORE_FORMAT: u8 = 22;

/// Reduction invariant broken (duplicate ids, ledger, unknown record).
pub const EXIT_REDUCTION: u8 = 23;

/// Run cancelled before completion.
pub const EXIT_CANCELLED: u8 = 24;

/// Map an engine error to its exit code.
pub fn engine_exit_code(err: &EngineError) -> u8 {
    match err {
        EngineError::Scorer { .. } => EXIT_SCORER,
        EngineError::Store(e) => match e.kind {
            StoreErrorKind::Io => EXIT_STORE_IO,
            StoreErrorKind::Format | StoreErrorKind::Missing => EXIT_STORE_FORMAT,
        },
        EngineError::Config(_) => EXIT_CONFIG_INVALID,
        EngineError::Cancelled { .. } => EXIT_CANCELLED,
        EngineError::DuplicateRecord { .. }
        | EngineError::UnknownRecord { .. }
        | EngineError::Ledger(_)
        | EngineError::ReductionIncomplete { .. } => EXIT_REDUCTION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemaster_engine::{ScorerError, StoreError};

    #[test]
    fn codes_are_distinct() {
        let mut codes = vec![
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_CONFIG_READ,
            EXIT_CONFIG_INVALID,
            EXIT_INPUT_READ,
            EXIT_INPUT_PARSE,
            EXIT_SCORER,
            EXIT_STORE_IO,
            EXIT_STORE_FORMAT,
            EXIT_REDUCTION,
            EXIT_CANCELLED,
        ];
        let n = codes.len();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), n);
    }

    #[test]
    fn store_kinds_map_separately() {
        let io = EngineError::Store(StoreError::io("a.csv", "disk full"));
        let fmt = EngineError::Store(StoreError::format("a.csv", "bad id"));
        assert_eq!(engine_exit_code(&io), EXIT_STORE_IO);
        assert_eq!(engine_exit_code(&fmt), EXIT_STORE_FORMAT);

        let scorer = EngineError::Scorer {
            comparison: "USA batch 0".into(),
            source: ScorerError::Timeout { seconds: 1 },
        };
        assert_eq!(engine_exit_code(&scorer), EXIT_SCORER);
    }

    #[test]
    fn cancelled_run_has_own_code() {
        let err = EngineError::Cancelled {
            country: "India".into(),
        };
        assert_eq!(engine_exit_code(&err), EXIT_CANCELLED);
    }
}
