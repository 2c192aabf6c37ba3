pub mod disjoint_set;
pub mod driver;
pub mod error;
pub mod ledger;
pub mod masters;
pub mod normalizer;
pub mod partition;
pub mod report;
pub mod scope;
pub mod scorer;
pub mod store;
pub mod summary;

pub use driver::{CancelToken, CountryOutcome, CountryStats, Driver};
pub use error::{EngineError, ScorerError, StoreError, StoreErrorKind};
pub use ledger::Ledger;
pub use report::{ReportRow, REPORT_COLUMNS};
pub use scorer::{ScoreMode, ScoreRequest, Scorer, SimilarityScorer};
pub use store::{ArtifactStore, FinalArtifacts, MasterKey, MemoryStore};
pub use summary::RunSummary;
