// File I/O: raw input ingestion, artifact files, external scorer process

pub mod command_scorer;
pub mod error;
pub mod fs_store;
pub mod ingest;
pub mod rows;

pub use command_scorer::CommandScorer;
pub use error::IngestError;
pub use fs_store::FsStore;
pub use ingest::{load_records, parse_records, CountryRecords};
