//! QPV CLI - Quantum Program Verifier
//!
//! Runs surface-language source files against the preloaded operator
//! library and reports verdicts and proof outlines.
//!
//! Features:
//! - Modern CLI with clap derive macros
//! - Structured logging with tracing
//! - Colored verdict output, JSON mode for tooling

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use qpv_lang::{Interpreter, Outcome};
use qpv_verify::{prelude, Verdict};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// QPV - Quantum Program Verifier
///
/// Verifies partial-correctness judgements for nondeterministic quantum
/// programs annotated with pre- and postconditions and loop invariants.
#[derive(Parser)]
#[command(name = "qpv")]
#[command(author = "QPV Team")]
#[command(version)]
#[command(about = "Quantum Program Verifier", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file: execute its commands and verify its proof terms
    Run {
        /// Path to the source file
        file: PathBuf,
    },

    /// List the preloaded operator library
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install the tracing subscriber")?;

    match cli.command {
        Commands::Run { file } => run_file(&file, cli.format),
        Commands::Info => info(cli.format),
    }
}

fn run_file(file: &PathBuf, format: OutputFormat) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut interpreter = Interpreter::new();
    let outcomes = interpreter
        .run_source(&source)
        .with_context(|| format!("failed to run {}", file.display()))?;

    let mut all_hold = true;
    for outcome in &outcomes {
        if !outcome.succeeded() {
            all_hold = false;
        }
        match format {
            OutputFormat::Json => println!("{}", outcome_json(outcome)),
            OutputFormat::Text => print_outcome(outcome),
        }
    }

    if !all_hold {
        std::process::exit(1);
    }
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Verified { name, verdict, rendered } => {
            let colored_verdict = match verdict {
                Verdict::Holds => verdict.to_string().green().bold(),
                Verdict::DoesNotHold => verdict.to_string().red().bold(),
                Verdict::Undetermined => verdict.to_string().yellow().bold(),
            };
            println!("{} {}", name.bold(), colored_verdict);
            println!("{rendered}");
        }
        Outcome::Failed { context, error } => {
            println!("{} {context}: {error}", "error".red().bold());
        }
        other => println!("{other}"),
    }
    println!();
}

fn outcome_json(outcome: &Outcome) -> String {
    let value = match outcome {
        Outcome::Verified { name, verdict, rendered } => serde_json::json!({
            "command": "proof",
            "name": name,
            "verdict": verdict,
            "outline": rendered,
        }),
        Outcome::Defined { name, kind } => serde_json::json!({
            "command": "def",
            "name": name,
            "kind": kind,
        }),
        Outcome::Shown { path, text } => serde_json::json!({
            "command": "show",
            "path": path,
            "text": text,
        }),
        Outcome::Saved { path, file } => serde_json::json!({
            "command": "save",
            "path": path,
            "file": file,
        }),
        Outcome::SettingUpdated { key, value } => serde_json::json!({
            "command": "setting",
            "key": key,
            "value": value,
        }),
        Outcome::Failed { context, error } => serde_json::json!({
            "command": "error",
            "context": context,
            "error": error,
        }),
    };
    value.to_string()
}

fn info(format: OutputFormat) -> Result<()> {
    let library = prelude::standard();
    let entries = library.entries();
    match format {
        OutputFormat::Json => {
            let listing: Vec<_> = entries
                .iter()
                .map(|(name, binding)| serde_json::json!({"name": name, "kind": binding.kind()}))
                .collect();
            println!("{}", serde_json::Value::Array(listing));
        }
        OutputFormat::Text => {
            println!("{}", "Preloaded operator library".bold());
            for (name, binding) in entries {
                println!("  {:<14} {}", name, binding.kind());
            }
        }
    }
    Ok(())
}
