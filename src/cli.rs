//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::AnalysisOverrides;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// skillprobe - measure how efficiently an assistant routes through a skill bundle
///
/// Install a bundle variant, run the test queries in a fresh assistant
/// session, then analyze the recorded transcripts to count documentation
/// reads per query.
///
/// Examples:
///   skillprobe setup v2
///   skillprobe queries
///   skillprobe analyze --hours 4
///   skillprobe analyze --format markdown --output results.md
///   skillprobe init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .skillprobe.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true, env = "SKILLPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress bar)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Install a bundle variant into the skill directory
    Setup(SetupArgs),

    /// Analyze recent session transcripts and compare variants
    Analyze(AnalyzeArgs),

    /// Print the test queries for copy/paste
    Queries,

    /// Generate a default .skillprobe.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SetupArgs {
    /// Variant label to install (e.g. v1, v2, v3, repo)
    #[arg(value_name = "VARIANT", default_value = "repo")]
    pub variant: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Only consider transcripts modified within this many hours
    #[arg(long, value_name = "HOURS")]
    pub hours: Option<u64>,

    /// Maximum number of recent sessions to analyze
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Output format (text, markdown, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory holding per-project transcript folders
    #[arg(long, value_name = "DIR")]
    pub sessions_dir: Option<PathBuf>,

    /// Installed skill directory (where the version marker lives)
    #[arg(long, value_name = "DIR")]
    pub skill_dir: Option<PathBuf>,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Console text (default)
    #[default]
    Text,
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(Command::Analyze(ref analyze)) = self.command {
            if analyze.hours == Some(0) {
                return Err("Hours must be at least 1".to_string());
            }
            if analyze.limit == Some(0) {
                return Err("Limit must be at least 1".to_string());
            }
            if let Some(ref dir) = analyze.sessions_dir {
                if dir.exists() && !dir.is_dir() {
                    return Err(format!(
                        "Sessions path is not a directory: {}",
                        dir.display()
                    ));
                }
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}

impl AnalyzeArgs {
    /// Config overrides carried by these flags.
    pub fn overrides(&self) -> AnalysisOverrides {
        AnalysisOverrides {
            hours: self.hours,
            limit: self.limit,
            sessions_dir: self.sessions_dir.clone(),
            skill_dir: self.skill_dir.clone(),
        }
    }
}
