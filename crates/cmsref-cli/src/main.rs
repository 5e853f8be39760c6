//! # cmsref CLI entry point
//!
//! Parses command-line arguments, installs the tracing subscriber, and
//! dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmsref_cli::audit::{run_audit, AuditArgs};
use cmsref_cli::ingest::{run_ingest, IngestArgs};
use cmsref_cli::load_config;

/// CMS reference-data ingestion.
///
/// Checks that contracts, layouts, and API mappings agree, and turns one
/// published release file into validated, hashed JSON-lines records.
#[derive(Parser, Debug)]
#[command(name = "cmsref", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON objects.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a YAML pipeline configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check contract, layout, and API mapping alignment.
    Audit(AuditArgs),

    /// Ingest one source file.
    Ingest(IngestArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let result = load_config(cli.config.as_deref()).and_then(|config| match &cli.command {
        Commands::Audit(args) => run_audit(args, &config),
        Commands::Ingest(args) => run_ingest(args, &config),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
