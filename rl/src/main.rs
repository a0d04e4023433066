//! ralphloop - bounded iteration controller
//!
//! CLI entry point: `rl run SPEC` drives the worker until a terminal status and
//! exits with that status's code.

use std::fs;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use eyre::{Context, Result};
use tracing::{debug, error, info};

use ralphloop::cli::{Cli, Command, RunArgs, get_log_path};
use ralphloop::config::Config;
use ralphloop::executor::CommandExecutor;
use ralphloop::r#loop::{IterationController, RunStatus};
use ralphloop::report::ConsoleReporter;
use ralphloop::signal::{self, CancelSignal};
use ralphloop::{CONFIG_ERROR_EXIT_CODE, ConfigError};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Run(args)) => {
            let config = match Config::load(cli.config.as_ref()) {
                Ok(config) => config,
                Err(e) => exit_config_error(e),
            };
            let code = cmd_run(config, args).await?;
            debug!(code, "main: run finished");
            std::process::exit(code);
        }
        Some(Command::Logs { follow, lines }) => cmd_logs(follow, lines),
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Report a configuration problem and exit with the config error code
fn exit_config_error(err: ConfigError) -> ! {
    error!(error = %err, "Invalid configuration");
    eprintln!("Error: {}", err);
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    std::process::exit(CONFIG_ERROR_EXIT_CODE);
}

/// Run the loop to a terminal status, returning the process exit code
async fn cmd_run(mut config: Config, args: RunArgs) -> Result<i32> {
    debug!(?args, "cmd_run: called");
    args.apply(&mut config);

    let run_config = config
        .run_config(args.spec.clone())
        .unwrap_or_else(|e| exit_config_error(e));
    let command = config.command_spec().unwrap_or_else(|e| exit_config_error(e));
    let policy = config.policy();
    info!(
        "Running {} against {} (max_iterations: {})",
        command.program,
        run_config.spec_path.display(),
        run_config.max_iterations
    );

    let cancel = CancelSignal::new();
    signal::install_handlers(cancel.clone(), RunStatus::Cancelled.exit_code())
        .context("Failed to install signal handlers")?;

    let controller = IterationController::new(Arc::new(CommandExecutor::new(command, policy)), cancel)
        .with_reporter(Arc::new(ConsoleReporter::stdout().with_detail(args.verbose)));

    match controller.run(&run_config).await {
        Ok(final_status) => Ok(final_status.status.exit_code()),
        Err(e) => exit_config_error(e),
    }
}

/// Print the tail of the log file, or stream it with `--follow`
fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    debug!(follow, lines, "cmd_logs: called");
    let log_path = get_log_path();
    if !log_path.exists() {
        println!("No ralphloop log yet (expected at {})", log_path.display());
        return Ok(());
    }

    if follow {
        // Streaming is left to the system tail; it exits on Ctrl-C
        let status = std::process::Command::new("tail")
            .arg("-n")
            .arg(lines.to_string())
            .arg("-F")
            .arg(&log_path)
            .status()
            .context("Failed to run tail")?;
        debug!(?status, "cmd_logs: tail exited");
        return Ok(());
    }

    let content =
        fs::read_to_string(&log_path).with_context(|| format!("Failed to read {}", log_path.display()))?;
    let all: Vec<&str> = content.lines().collect();
    for line in &all[all.len().saturating_sub(lines)..] {
        println!("{}", line);
    }
    Ok(())
}
