// sitemaster CLI - recursive site-master consolidation runs

mod exit_codes;
mod logging;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "sitemaster")]
#[command(about = "Consolidate duplicate site records into a master set with a full cross-reference")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log per-comparison detail
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline described by a TOML config
    #[command(after_help = "\
Examples:
  sitemaster run pipeline.toml
  sitemaster run pipeline.toml --country India --country United_States
  sitemaster run pipeline.toml --json > summary.json
  sitemaster run pipeline.toml --output /data/out")]
    Run {
        /// Path to the pipeline .toml config
        config: PathBuf,

        /// Restrict the run to these countries (repeatable)
        #[arg(long)]
        country: Vec<String>,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Root directory for output artifacts (default: the config's directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a pipeline config without running
    #[command(after_help = "\
Examples:
  sitemaster validate pipeline.toml")]
    Validate {
        /// Path to the pipeline .toml config
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  sitemaster-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    logging::init(level);

    let result = match cli.command {
        Commands::Run {
            config,
            country,
            json,
            output,
        } => run::cmd_run(config, country, json, output),
        Commands::Validate { config } => run::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
