// Configuration loading
// Parsed from a pipeline .toml file; immutable for the duration of a run.

pub mod error;
pub mod pipeline;

pub use error::ConfigError;
pub use pipeline::{
    BatchingConfig, InputConfig, PathsConfig, PipelineConfig, ScorerConfig, ScorerKind,
    ScoringConfig,
};
