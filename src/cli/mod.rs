//! # CLI
//!
//! Command-line interface for running collections in CI/CD pipelines:
//! `testman run collection.json --env prod`, with text or JSON output, an
//! optional report file, and a non-zero exit code when any request fails.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::warn;

use crate::collections::Collection;
use crate::history::{History, HistoryEntry};
use crate::runner::{self, RequestReport, RunReport};
use crate::storage;

#[derive(Debug, Parser)]
#[command(name = "testman", about = "API test runner: collections, scripts, validations")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every request in a collection file.
    Run(RunArgs),
    /// List environments, optionally switching the active one.
    Env(EnvArgs),
    /// Show or clear the run history.
    History(HistoryArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Path to the collection JSON file.
    collection: PathBuf,
    /// Environment to activate for this run.
    #[arg(long = "env")]
    environment: Option<String>,
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
    /// Write the JSON report to this file in addition to stdout output.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct EnvArgs {
    /// Persist this environment as the active one.
    #[arg(long)]
    activate: Option<String>,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    /// Remove all history entries.
    #[arg(long)]
    clear: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Execute the parsed command, returning the process exit code.
pub async fn execute(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Env(args) => env(args),
        Command::History(args) => history(args),
    }
}

async fn run(args: RunArgs) -> Result<i32> {
    let collection = Collection::load(&args.collection)?;

    let mut environments = storage::load_environments()?;
    if let Some(name) = &args.environment {
        environments.activate(name).map_err(anyhow::Error::msg)?;
    }

    let report = runner::run_collection(&collection, &environments).await;

    match args.output {
        OutputFormat::Text => print_text_report(&report),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        ),
    }

    if let Some(path) = &args.report {
        let raw = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write report file `{}`", path.display()))?;
    }

    if let Err(err) = record_history(&report) {
        // A broken history file should not fail a CI run.
        warn!("could not update history: {err:#}");
    }

    Ok(if report.all_passed() { 0 } else { 1 })
}

fn print_text_report(report: &RunReport) {
    for request in &report.requests {
        print_request(request);
    }
    println!(
        "\n{}: {}/{} requests passed ({} ms)",
        if report.all_passed() { "PASS" } else { "FAIL" },
        report.passed,
        report.total,
        report.duration_ms
    );
}

fn print_request(request: &RequestReport) {
    let verdict = if request.passed() { "PASS" } else { "FAIL" };
    match (request.status, request.duration_ms) {
        (Some(status), Some(ms)) => {
            println!("{verdict} {} {} -> {status} ({ms} ms)", request.method, request.url);
        }
        _ => println!("{verdict} {} {}", request.method, request.url),
    }

    if let Some(error) = &request.error {
        println!("  error: {error}");
    }
    for (label, outcome) in [("pre", &request.pre_script), ("post", &request.post_script)] {
        if let Some(outcome) = outcome {
            for line in &outcome.log_lines {
                println!("  [{label}] {line}");
            }
            if let Some(message) = &outcome.error_message {
                println!("  [{label}] script error: {message}");
            }
        }
    }
    for validation in &request.validations {
        println!("  {}", validation.message);
    }
}

fn env(args: EnvArgs) -> Result<i32> {
    let mut environments = storage::load_environments()?;
    if let Some(name) = &args.activate {
        environments.activate(name).map_err(anyhow::Error::msg)?;
        storage::save_environments(&environments)?;
    }

    if environments.environments.is_empty() {
        println!("No environments defined. Edit .testman/environments.json to add some.");
    }
    for environment in &environments.environments {
        let marker = if environments.active_environment.as_deref() == Some(&environment.name) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {} ({} variables)",
            environment.name,
            environment.variables.len()
        );
    }
    Ok(0)
}

fn history(args: HistoryArgs) -> Result<i32> {
    let mut history = storage::load_history()?;
    if args.clear {
        history.clear();
        storage::save_history(&history)?;
        println!("History cleared.");
        return Ok(0);
    }

    for entry in history.entries() {
        let status = entry
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "[{}] {} {} -> {} ({} passed, {} failed)",
            format_timestamp(entry.timestamp),
            entry.method,
            entry.url,
            status,
            entry.checks_passed,
            entry.checks_failed
        );
    }
    Ok(0)
}

fn format_timestamp(timestamp: u64) -> String {
    chrono::DateTime::from_timestamp(timestamp as i64, 0)
        .map(|when| when.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn record_history(report: &RunReport) -> Result<()> {
    // A corrupt history file starts a fresh one rather than failing the run.
    let mut history = storage::load_history().unwrap_or_else(|_| History::new());
    let timestamp = current_unix_timestamp();
    for request in &report.requests {
        let (checks_passed, checks_failed) = request.check_counts();
        history.push(HistoryEntry {
            timestamp,
            method: request.method,
            url: request.url.clone(),
            status: request.status,
            duration_ms: request.duration_ms,
            checks_passed,
            checks_failed,
        });
    }
    storage::save_history(&history)
}

fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn formats_history_timestamps_as_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn parses_run_arguments() {
        let cli = Cli::parse_from([
            "testman",
            "run",
            "smoke.json",
            "--env",
            "prod",
            "--output",
            "json",
            "--report",
            "out.json",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.collection, PathBuf::from("smoke.json"));
        assert_eq!(args.environment.as_deref(), Some("prod"));
        assert_eq!(args.output, OutputFormat::Json);
        assert_eq!(args.report, Some(PathBuf::from("out.json")));
    }
}
