//! CLI command definitions and dispatch for the `conversary` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! resource (e.g., `conversary summary add`, `conversary model pull`).

pub mod chat;
pub mod history;
pub mod model;
pub mod summary;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Talk to a local language model that remembers your day.
#[derive(Parser)]
#[command(name = "conversary", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Tracing filter for the chosen verbosity. `RUST_LOG` overrides it.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,conversary_core=debug,conversary_infra=debug",
            _ => "trace",
        }
    }

    /// Whether a model download should draw a progress bar.
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json && !matches!(self.command, Commands::Serve { .. })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Host to bind to [default: config `server.host`].
        #[arg(long, env = "CONVERSARY_HOST")]
        host: Option<String>,

        /// Port to listen on [default: config `server.port`].
        #[arg(short, long, env = "CONVERSARY_PORT")]
        port: Option<u16>,

        /// Load the model at startup instead of on the first request.
        #[arg(long)]
        preload: bool,
    },

    /// Send a message, or start an interactive conversation without one.
    Chat {
        /// Message to send. Omit for an interactive session.
        message: Option<String>,
    },

    /// Show stored conversation history.
    History {
        /// Day to show (YYYY-MM-DD) [default: today].
        #[arg(long, conflicts_with = "all")]
        date: Option<String>,

        /// Show every stored exchange.
        #[arg(long)]
        all: bool,
    },

    /// Manage daily summaries.
    Summary {
        #[command(subcommand)]
        action: SummaryCommand,
    },

    /// Manage the local model.
    Model {
        #[command(subcommand)]
        action: ModelCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SummaryCommand {
    /// Record today's summary.
    Add {
        /// Summary text (prompted if omitted).
        text: Option<String>,

        /// Sentiment score for the day (e.g. -1.0 to 1.0).
        #[arg(long, allow_hyphen_values = true)]
        sentiment: Option<f64>,

        /// Free-form notes.
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show the summary for a day.
    Show {
        /// Day to show (YYYY-MM-DD) [default: today].
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ModelCommand {
    /// Download the configured model weights.
    Pull {
        /// Download again even if the file is already installed.
        #[arg(long)]
        force: bool,
    },

    /// Show model configuration, installed weights, and device.
    Info,
}

/// Parse an optional `YYYY-MM-DD` argument, defaulting to today.
pub fn parse_date_arg(date: Option<&str>) -> anyhow::Result<chrono::NaiveDate> {
    match date {
        Some(raw) => chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!("invalid date '{raw}', expected YYYY-MM-DD")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}
