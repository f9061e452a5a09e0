//! rota CLI - Weekly Shift Scheduler
//!
//! Reads a scheduling request as JSON, writes the response to stdout.
//! Diagnostics go to stderr.

mod config;
mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::{Config, Overrides};
use render::ExitCode;
use rota_core::audit::audit;
use rota_core::calendar::WeekCalendar;
use rota_core::response::AssignmentTable;
use rota_core::ScheduleRequest;
use rota_solver::Backend;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rota")]
#[command(author, version, about = "Weekly shift scheduler", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

/// Search backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SearchBackend {
    /// Constraint programming (Pumpkin)
    Cp,
    /// Parallel branch and bound
    BranchAndBound,
}

impl From<SearchBackend> for Backend {
    fn from(backend: SearchBackend) -> Self {
        match backend {
            SearchBackend::Cp => Backend::Cp,
            SearchBackend::BranchAndBound => Backend::BranchAndBound,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a scheduling request
    Solve {
        /// Request file (stdin if not specified)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file (defaults to ./rota.toml when present)
        #[arg(short, long, env = "ROTA_CONFIG")]
        config: Option<PathBuf>,

        /// Search time limit in seconds
        #[arg(long, value_name = "SECS")]
        time_limit: Option<u64>,

        /// Parallel search workers (branch-and-bound backend)
        #[arg(long)]
        workers: Option<usize>,

        /// Search backend
        #[arg(long, value_enum)]
        backend: Option<SearchBackend>,

        /// Seed for tie-breaking; varies per run if not given
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Check a schedule against a request's hard rules
    Check {
        /// Request file
        #[arg(value_name = "REQUEST")]
        request: PathBuf,

        /// Response or bare assignment table
        #[arg(value_name = "RESPONSE")]
        response: PathBuf,
    },

    /// Show the valid slots of a request's week
    Slots {
        /// Request file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(code) => code.into(),
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::Failure.into()
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Solve {
            file,
            format,
            output,
            config,
            time_limit,
            workers,
            backend,
            seed,
        } => {
            let config = Config::load(config.as_deref())?;
            let options = config.solve_options(Overrides {
                time_limit_secs: time_limit,
                workers,
                seed,
                backend: backend.map(Backend::from),
            });
            let input = read_input(file.as_deref())?;
            info!(bytes = input.len(), seed = options.seed, backend = %options.backend, "solving");

            let response = rota_solver::respond(&input, &options);
            let text = match format {
                Format::Json => {
                    let mut json = serde_json::to_string_pretty(&response)?;
                    json.push('\n');
                    json
                }
                Format::Text => {
                    let calendar = ScheduleRequest::from_json(&input)
                        .ok()
                        .map(|r| WeekCalendar::build(r.week_start, &r.holidays));
                    render::response_text(&response, calendar.as_ref())
                }
            };
            write_output(output.as_deref(), &text)?;
            Ok(ExitCode::from_response(&response))
        }
        Commands::Check { request, response } => {
            let request = ScheduleRequest::from_json(&read_input(Some(&request))?)?;
            let table = read_table(&response)?;
            let violations = audit(&request, &table);
            debug!(count = violations.len(), "audit finished");
            write_output(None, &render::violations_text(&violations))?;
            Ok(ExitCode::from_violations(&violations))
        }
        Commands::Slots { file, format } => {
            let request = ScheduleRequest::from_json(&read_input(Some(&file))?)?;
            let calendar = WeekCalendar::build(request.week_start, &request.holidays);
            let text = match format {
                Format::Text => render::slots_text(&calendar),
                Format::Json => {
                    let slots: Vec<serde_json::Value> = calendar
                        .slots()
                        .iter()
                        .map(|s| {
                            serde_json::json!({
                                "day": s.day,
                                "shift": s.shift,
                                "date": calendar.date_for_day(s.day),
                            })
                        })
                        .collect();
                    let value = serde_json::json!({
                        "weekStart": calendar.week_start(),
                        "slots": slots,
                        "pruned": calendar.pruned(),
                    });
                    let mut json = serde_json::to_string_pretty(&value)?;
                    json.push('\n');
                    json
                }
            };
            write_output(None, &text)?;
            Ok(ExitCode::Success)
        }
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => {
            std::fs::read_to_string(p).with_context(|| format!("cannot read {}", p.display()))
        }
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input).context("cannot read stdin")?;
            Ok(input)
        }
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(p) => std::fs::write(p, text).with_context(|| format!("cannot write {}", p.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Assignments from a full response, a bare result, or a bare table
fn read_table(path: &Path) -> Result<AssignmentTable> {
    let text = read_input(Some(path))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not JSON", path.display()))?;
    if value.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
        bail!("{} is a failure response", path.display());
    }
    let table = value
        .pointer("/result/assignments")
        .or_else(|| value.get("assignments"))
        .unwrap_or(&value)
        .clone();
    serde_json::from_value(table)
        .with_context(|| format!("{} has no assignment table", path.display()))
}
