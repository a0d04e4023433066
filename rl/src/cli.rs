//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;

/// ralphloop - run a worker against a spec until it succeeds
#[derive(Parser)]
#[command(
    name = "rl",
    about = "Drive an external worker against a spec, retrying with a delay until it succeeds",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Exit codes: 0 succeeded, 1 fatal error, 2 exhausted iterations, 130 cancelled, 78 bad config"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the worker against a spec until it succeeds or gives up
    Run(RunArgs),

    /// Show logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Options for `rl run`; each one overrides the config file
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Spec file handed to the worker on every attempt
    #[arg(value_name = "SPEC")]
    pub spec: PathBuf,

    /// Maximum attempts
    #[arg(short = 'n', long)]
    pub max_iterations: Option<u32>,

    /// Delay between attempts in milliseconds
    #[arg(short, long)]
    pub delay_ms: Option<u64>,

    /// Multiply the delay by this factor after each attempt
    #[arg(short, long)]
    pub backoff: Option<f64>,

    /// Per-attempt timeout in milliseconds
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// Worker command (overrides executor.command)
    #[arg(short = 'x', long)]
    pub command: Option<String>,

    /// Require this text in the worker's stdout before a clean exit counts as success
    #[arg(short = 'm', long)]
    pub completion_marker: Option<String>,

    /// Print worker output after each attempt
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut Config) {
        debug!(?self, "RunArgs::apply: called");
        if let Some(max) = self.max_iterations {
            config.run.max_iterations = max;
        }
        if let Some(delay) = self.delay_ms {
            config.run.delay_ms = delay;
        }
        if let Some(backoff) = self.backoff {
            config.run.backoff_multiplier = backoff;
        }
        if let Some(timeout) = self.timeout_ms {
            config.executor.timeout_ms = Some(timeout);
        }
        if let Some(command) = &self.command {
            config.executor.command = command.clone();
        }
        if let Some(marker) = &self.completion_marker {
            config.executor.completion_marker = Some(marker.clone());
        }
    }
}

/// Path of the log file written by every run
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ralphloop")
        .join("logs")
        .join("ralphloop.log")
}
