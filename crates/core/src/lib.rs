//! `sitemaster-core` - shared record and match types.
//!
//! Everything here is plain data plus the pure cleaning functions that turn
//! an ingested row into a comparable [`Record`]. No IO.

pub mod model;
pub mod normalize;

pub use model::{
    CandidatePair, CrossRefEntry, Field, FieldScores, MatchLink, Record, RecordId, SiteFields,
};
