//! skillprobe - documentation routing harness for AI coding assistants
//!
//! Installs a version of a skill bundle, then scans the assistant's
//! session transcripts to measure how many bundle files it reads per
//! test query.
//!
//! Exit codes:
//!   0 - Success (including "no data" analysis results)
//!   1 - Configuration, installation or I/O error

mod analysis;
mod cli;
mod config;
mod error;
mod install;
mod models;
mod report;
mod session;

use analysis::{AnalyzerConfig, SessionAnalyzer};
use anyhow::{Context, Result};
use chrono::Local;
use clap::CommandFactory;
use cli::{AnalyzeArgs, Args, Command, OutputFormat};
use config::{AnalysisOverrides, Config, CONFIG_FILE};
use error::HarnessError;
use install::Installer;
use models::{AnalysisReport, TestQuery};
use session::SessionScanner;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let Some(command) = args.command.clone() else {
        if let Err(e) = Args::command().print_help() {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        println!();
        return;
    };

    init_logging(&args);
    info!("skillprobe v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(&args, command) {
        report_failure(&e);
    }
}

fn run(args: &Args, command: Command) -> Result<()> {
    match command {
        Command::Setup(setup) => {
            let config = load_validated_config(args, None)?;
            run_setup(&config, &setup.variant, !args.quiet)
        }
        Command::Analyze(analyze) => {
            let config = load_validated_config(args, Some(&analyze.overrides()))?;
            run_analyze(&config, &analyze)
        }
        Command::Queries => {
            let config = load_validated_config(args, None)?;
            print!("{}", report::format_query_list(&config.queries));
            Ok(())
        }
        Command::InitConfig => handle_init_config(),
    }
}

/// Print an error with any remediation guidance and exit non-zero.
fn report_failure(e: &anyhow::Error) -> ! {
    error!("{:#}", e);
    eprintln!("\n❌ Error: {:#}", e);
    if let Some(guidance) = e.downcast_ref::<HarnessError>().and_then(|h| h.guidance()) {
        eprintln!("   {}", guidance);
    }
    std::process::exit(1);
}

/// Handle init-config: generate a default .skillprobe.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize paths, variants, and test queries.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // An explicit path must load
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

/// Load configuration, apply analyze-time overrides, then validate.
fn load_validated_config(args: &Args, overrides: Option<&AnalysisOverrides>) -> Result<Config> {
    let mut config = load_config(args)?;
    if let Some(overrides) = overrides {
        config.merge_with_args(overrides);
    }
    config.validate()?;
    Ok(config)
}

/// Install a variant and tell the operator what to run next.
fn run_setup(config: &Config, variant: &str, show_progress: bool) -> Result<()> {
    let outcome = Installer::new(config, show_progress).install(variant)?;

    let rule = "=".repeat(50);
    println!("\n{}", rule);
    println!(
        "Installed {} ({}) skill",
        outcome.label.to_uppercase(),
        outcome.description
    );
    println!("{}", rule);
    println!("   Source: {}", outcome.source.display());
    println!("   Target: {}", outcome.target.display());
    println!("   Files copied: {}", outcome.files_copied);
    if outcome.seeded {
        println!("   Backup created from the repository bundle");
    }
    println!("Reference structure: [{}]", outcome.reference_files.join(", "));

    println!("\nNow start a NEW assistant session and run these queries:");
    print_query_prompts(&config.queries);
    println!("\nAfter testing, run: skillprobe analyze");
    Ok(())
}

fn print_query_prompts(queries: &[TestQuery]) {
    let rule = "-".repeat(50);
    println!("{}", rule);
    for query in queries {
        println!("  {} ({}): \"{}\"", query.id, query.tier, query.text);
    }
    println!("{}", rule);
}

/// Scan recent transcripts, aggregate per variant and emit the report.
fn run_analyze(config: &Config, args: &AnalyzeArgs) -> Result<()> {
    let window_hours = config.analysis.recency_hours;
    let scanner = SessionScanner::from_config(config);
    let candidates =
        scanner.find_candidate_sessions(Duration::from_secs(window_hours.saturating_mul(3600)))?;
    info!(
        "Found {} recent sessions under {}",
        candidates.len(),
        scanner.sessions_dir().display()
    );

    let analyzer = SessionAnalyzer::new(AnalyzerConfig::from(config));
    let (lines, results): (Vec<_>, Vec<_>) = analyzer
        .analyze_candidates(&candidates, config.analysis.max_sessions)
        .into_iter()
        .unzip();

    let comparison = analyzer.is_comparing();
    let groups = if comparison {
        analysis::group_by_version(results, &config.analysis.compare_labels)
    } else {
        vec![("all".to_string(), results)]
    };
    let (summaries, verdict) = analysis::aggregate(&groups);

    let report = AnalysisReport {
        generated_at: Local::now(),
        window_hours,
        comparison,
        candidates_found: candidates.len(),
        sessions: lines,
        groups: summaries,
        verdict,
    };

    let output = match args.format {
        OutputFormat::Text => report::generate_text_report(&report),
        OutputFormat::Markdown => report::generate_markdown_report(&report),
        OutputFormat::Json => report::generate_json_report(&report)?,
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("✅ Report saved to: {}", path.display());
        }
        None => println!("{}", output),
    }

    Ok(())
}
