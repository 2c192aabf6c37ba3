//! `sitemaster run` / `sitemaster validate`.

use std::path::{Path, PathBuf};

use sitemaster_config::{PipelineConfig, ScorerKind};
use sitemaster_core::normalize::country_key;
use sitemaster_engine::{
    CancelToken, Driver, EngineError, RunSummary, Scorer, SimilarityScorer, StoreErrorKind,
};
use sitemaster_io::{load_records, CommandScorer, FsStore, IngestError};

use crate::exit_codes::{
    engine_exit_code, EXIT_CONFIG_INVALID, EXIT_CONFIG_READ, EXIT_INPUT_PARSE, EXIT_INPUT_READ,
    EXIT_SCORER, EXIT_STORE_IO,
};
use crate::CliError;

fn load_config(config_path: &Path) -> Result<PipelineConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(
            EXIT_CONFIG_READ,
            format!("cannot read config {}: {e}", config_path.display()),
        )
    })?;
    PipelineConfig::from_toml(&config_str)
        .map_err(|e| CliError::new(EXIT_CONFIG_INVALID, e.to_string()))
}

/// Cancel the run on Ctrl-C. The driver stops before its next comparison.
fn cancel_on_interrupt() -> CancelToken {
    let cancel = CancelToken::new();
    let flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.cancel()) {
        log::warn!("cannot install Ctrl-C handler: {e}");
    }
    cancel
}

pub fn cmd_run(
    config_path: PathBuf,
    countries: Vec<String>,
    json_output: bool,
    output_root: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Input and outputs resolve relative to the config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let paths = config
        .paths
        .resolve_against(output_root.as_deref().unwrap_or(base_dir));
    let input_path = base_dir.join(&config.input.file);

    let mut loaded = load_records(&input_path, &config.input).map_err(|e| {
        let code = match e {
            IngestError::Io { .. } => EXIT_INPUT_READ,
            _ => EXIT_INPUT_PARSE,
        };
        CliError::new(code, e.to_string())
    })?;

    if !countries.is_empty() {
        let wanted: Vec<String> = countries.iter().map(|c| country_key(c)).collect();
        if let Some(missing) = wanted
            .iter()
            .find(|w| !loaded.iter().any(|c| &c.country == *w))
        {
            let available: Vec<&str> = loaded.iter().map(|c| c.country.as_str()).collect();
            return Err(CliError::args(format!("no records for country '{missing}'"))
                .with_hint(format!("input has: {}", available.join(", "))));
        }
        loaded.retain(|c| wanted.contains(&c.country));
    }

    let mut store = FsStore::new(&paths);
    store
        .prepare()
        .map_err(|e| CliError::new(EXIT_STORE_IO, e.to_string()))?;

    let mut scorer: Box<dyn Scorer> = match config.scorer.kind {
        ScorerKind::Builtin => Box::new(SimilarityScorer::new()),
        ScorerKind::Command => Box::new(
            CommandScorer::new(&config.scorer, &paths.raw_scores).map_err(|e| {
                CliError::new(EXIT_SCORER, e.to_string())
                    .with_hint("check [scorer] command in the config and that it is on PATH")
            })?,
        ),
    };

    let cancel = cancel_on_interrupt();
    let mut summary = RunSummary::new(&config.name);
    for country in &loaded {
        let outcome = Driver::new(
            &config.scoring,
            config.batching.max_size,
            scorer.as_mut(),
            &mut store,
        )
        .with_cancel(cancel.clone())
        .run_country(&country.country, &country.records)
        .map_err(|e| {
            let code = engine_exit_code(&e);
            let err = CliError::new(code, e.to_string());
            match &e {
                EngineError::Store(s) if s.kind == StoreErrorKind::Io => {
                    err.with_hint("output directory may be read-only or full; rerun after fixing")
                }
                EngineError::Cancelled { .. } => {
                    err.with_hint("interrupted; final artifacts for this country were not written")
                }
                _ => err,
            }
        })?;
        summary.push(&outcome);
    }

    if json_output {
        let json_str = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    // Human summary to stderr
    for c in &summary.countries {
        let s = &c.stats;
        eprintln!(
            "{}: {} records -> {} masters ({} batches, {} levels, {} scorer calls, {} links)",
            c.country, s.records, s.masters, s.batches, s.levels, s.scorer_calls, s.links,
        );
    }
    eprintln!(
        "{} countries, {} records -> {} masters; artifacts in {}",
        summary.countries.len(),
        summary.total_records(),
        summary.total_masters(),
        paths.master_data.display(),
    );

    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let input_path = base_dir.join(&config.input.file);
    if !input_path.exists() {
        log::warn!("input file {} does not exist yet", input_path.display());
    }
    eprintln!(
        "valid: pipeline '{}' ({} scorer, batch size {}, total threshold {})",
        config.name, config.scorer.kind, config.batching.max_size, config.scoring.total_threshold,
    );
    Ok(())
}
