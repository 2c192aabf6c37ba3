//! External scorer process.
//!
//! For each comparison the scope records are written to CSV files in the
//! raw-scores directory and the configured program is run as
//!
//! ```text
//! <command> <args...> --method dedup|linkage --country C --left L.csv
//!     [--right R.csv] --output OUT.csv --thresholds SITE_NAME=0.75,...
//!     --scaling-factor 3 --total-threshold 4
//! ```
//!
//! The program must exit 0 and leave `OUT.csv` with `SR_NUM_1`,
//! `SR_NUM_2`, the per-field `*_COMPARISON_SCORE` columns and
//! `NUM_OF_MATCHES_FOUND`. A lone `0,0` row means no matches.

use std::fs::{self, File};
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, info};
use sitemaster_config::{ScorerConfig, ScoringConfig};
use sitemaster_core::{CandidatePair, Field, Record};
use sitemaster_engine::{ScoreMode, ScoreRequest, Scorer, ScorerError};

use crate::rows::{ScoreRow, ID_COLUMN};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct CommandScorer {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    work_dir: PathBuf,
}

impl CommandScorer {
    /// Resolve the configured command on `PATH`. Inputs and outputs of each
    /// call are staged under `work_dir`.
    pub fn new(config: &ScorerConfig, work_dir: impl Into<PathBuf>) -> Result<Self, ScorerError> {
        let command = config
            .command
            .as_deref()
            .ok_or_else(|| ScorerError::Spawn("no scorer command configured".into()))?;
        let program = which::which(command)
            .map_err(|_| ScorerError::Spawn(format!("'{command}' not found")))?;
        Ok(Self {
            program,
            args: config.args.clone(),
            timeout: config.timeout(),
            work_dir: work_dir.into(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn arguments(
        &self,
        request: &ScoreRequest<'_>,
        left: &Path,
        right: Option<&Path>,
        output: &Path,
    ) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "--method".to_string(),
            request.mode.method().to_string(),
            "--country".to_string(),
            request.country.to_string(),
            "--left".to_string(),
            left.display().to_string(),
        ]);
        if let Some(right) = right {
            args.extend(["--right".to_string(), right.display().to_string()]);
        }
        args.extend([
            "--output".to_string(),
            output.display().to_string(),
            "--thresholds".to_string(),
            thresholds_arg(request.scoring),
            "--scaling-factor".to_string(),
            request.scoring.scaling_factor.to_string(),
            "--total-threshold".to_string(),
            request.scoring.total_threshold.to_string(),
        ]);
        args
    }

    fn run(&self, args: &[String]) -> Result<(), ScorerError> {
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ScorerError::Spawn(format!("{}: {e}", self.program.display())))?;

        // Drain stderr on the side so a chatty scorer cannot block on a full pipe
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let deadline = started + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ScorerError::Timeout {
                            seconds: self.timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(ScorerError::Spawn(e.to_string())),
            }
        };

        let stderr = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(ScorerError::Exit {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        debug!(
            "scorer finished in {:.1}s",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

impl Scorer for CommandScorer {
    fn score(&mut self, request: &ScoreRequest<'_>) -> Result<Vec<CandidatePair>, ScorerError> {
        fs::create_dir_all(&self.work_dir)
            .map_err(|e| ScorerError::Spawn(format!("{}: {e}", self.work_dir.display())))?;

        let stem = format!("{}_{}", request.country, request.label);
        let left_path = self.work_dir.join(format!("{stem}_Left.csv"));
        let right_path = self.work_dir.join(format!("{stem}_Right.csv"));
        let output = self.work_dir.join(format!("{stem}_Raw_Feature_Scores.csv"));
        // Stale output from an earlier run must not be mistaken for this one
        let _ = fs::remove_file(&output);

        let right = match request.mode {
            ScoreMode::Dedup(records) => {
                write_scope(&left_path, records)?;
                None
            }
            ScoreMode::Linkage { left, right } => {
                write_scope(&left_path, left)?;
                write_scope(&right_path, right)?;
                Some(right_path.as_path())
            }
        };

        let args = self.arguments(request, &left_path, right, &output);
        info!(
            "{} {}: scoring {} records with {}",
            request.country,
            request.label,
            request.mode.record_count(),
            self.program.display()
        );
        self.run(&args)?;

        read_scores(&output)
    }
}

fn thresholds_arg(scoring: &ScoringConfig) -> String {
    Field::ALL
        .iter()
        .map(|&f| format!("{}={}", f.column(), scoring.threshold(f)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Scope file: id plus the normalized comparable fields.
fn write_scope(path: &Path, records: &[&Record]) -> Result<(), ScorerError> {
    let stage_err = |e: String| ScorerError::Spawn(format!("cannot stage {}: {e}", path.display()));
    let file = File::create(path).map_err(|e| stage_err(e.to_string()))?;
    let mut w = csv::Writer::from_writer(BufWriter::new(file));

    let mut header = vec![ID_COLUMN];
    header.extend(Field::ALL.iter().map(|f| f.column()));
    w.write_record(&header).map_err(|e| stage_err(e.to_string()))?;
    for record in records {
        let mut row = vec![record.id.to_string()];
        row.extend(Field::ALL.iter().map(|&f| record.fields.get(f).to_string()));
        w.write_record(&row).map_err(|e| stage_err(e.to_string()))?;
    }
    w.flush().map_err(|e| stage_err(e.to_string()))
}

fn read_scores(path: &Path) -> Result<Vec<CandidatePair>, ScorerError> {
    let file = File::open(path)
        .map_err(|e| ScorerError::Output(format!("{}: {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let mut pairs = Vec::new();
    for row in reader.deserialize::<ScoreRow>() {
        let row = row.map_err(|e| ScorerError::Output(format!("{}: {e}", path.display())))?;
        if row.is_sentinel() {
            continue;
        }
        pairs.push(row.into_candidate());
    }
    Ok(pairs)
}
