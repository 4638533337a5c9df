//! `dose` CLI: agendas, adherence statistics and reminder plans for a patient
//! bundle from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Agenda for one week (bundle from stdin, JSON to stdout)
//! dose agenda --from 2026-03-02 --to 2026-03-08 < patient.json
//!
//! # Adherence statistics from file to file
//! dose stats -i patient.json -o stats.json
//!
//! # Reminders for the next 3 days, using settings from dose.toml
//! dose --config dose.toml reminders --now 2026-03-02T07:00:00Z --days 3 -i patient.json
//!
//! # Expected dose count of every medication
//! dose count -i patient.json
//! ```

mod config;
mod logging;

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dose_engine::record::{parse_date, parse_datetime};
use dose_engine::{InMemoryTriggerStore, PatientBundle};
use serde::Serialize;

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "dose",
    version,
    about = "Medication schedules, adherence and reminders"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a dose.toml config file (defaults to ./dose.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dose occurrences and appointments grouped by date
    Agenda {
        /// Input bundle (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// First date of the window (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        from: NaiveDate,
        /// Last date of the window, inclusive (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        to: NaiveDate,
    },
    /// Taken, not-taken and remaining doses per medication and in total
    Stats {
        /// Input bundle (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Plan dose and appointment reminders over the configured horizon
    Reminders {
        /// Input bundle (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Planning instant, RFC 3339 (defaults to the current time)
        #[arg(long, value_parser = parse_instant_arg)]
        now: Option<DateTime<Utc>>,
        /// Number of days to plan dose reminders for, overriding the config
        #[arg(long)]
        days: Option<u32>,
    },
    /// Expected dose count of each medication over its whole range
    Count {
        /// Input bundle (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_level(if cli.verbose { "debug" } else { "info" });

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Agenda {
            input,
            output,
            from,
            to,
        } => {
            if to < from {
                anyhow::bail!("--to ({}) is before --from ({})", to, from);
            }
            let bundle = read_bundle(input.as_deref())?;
            let report = bundle
                .agenda(from, to, &config.schedule.timezone)
                .context("Failed to build agenda")?;
            write_json(output.as_deref(), &report)?;
        }
        Commands::Stats { input, output } => {
            let bundle = read_bundle(input.as_deref())?;
            write_json(output.as_deref(), &bundle.adherence())?;
        }
        Commands::Reminders {
            input,
            output,
            now,
            days,
        } => {
            let bundle = read_bundle(input.as_deref())?;
            let policy = config.reminder_policy(days);
            let now = now.unwrap_or_else(Utc::now);

            let mut store = InMemoryTriggerStore::new();
            let report = bundle
                .reminders(&policy, now, &mut store)
                .context("Failed to plan reminders")?;
            tracing::info!(triggers = report.triggers.len(), "reminders planned");
            write_json(output.as_deref(), &report)?;
        }
        Commands::Count { input, output } => {
            let bundle = read_bundle(input.as_deref())?;
            write_json(output.as_deref(), &bundle.counts())?;
        }
    }

    Ok(())
}

fn parse_date_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn parse_instant_arg(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_datetime(s).map_err(|e| e.to_string())
}

fn read_bundle(path: Option<&str>) -> Result<PatientBundle> {
    let json = read_input(path)?;
    PatientBundle::from_json(&json).context("Failed to parse patient bundle")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_json<T: Serialize>(path: Option<&str>, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    content.push('\n');
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
