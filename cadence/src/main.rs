//! `cadence` - timed phase sequencer

use clap::Parser;

use cadence::cli::args::{Cli, OutputFormat};
use cadence::cli::commands::{self, Shutdown};
use cadence::error::{CadenceError, ConfigError, ExitCode};
use cadence::observability::{LogFormat, StopReason, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_format = match cli.log_format {
        OutputFormat::Human => LogFormat::Human,
        OutputFormat::Json => LogFormat::Json,
    };
    init_logging(log_format, cli.verbose, cli.quiet, cli.color);

    let shutdown = Shutdown::new();
    tokio::spawn(handle_signals(shutdown.clone()));

    let result = commands::dispatch(cli, shutdown.clone()).await;

    match result {
        Ok(()) => std::process::exit(shutdown.exit_code().unwrap_or(ExitCode::SUCCESS)),
        Err(e) => {
            eprintln!("error: {e}");
            if let CadenceError::Config(ConfigError::ValidationError { errors, .. }) = &e {
                for issue in errors {
                    eprintln!("  {issue}");
                }
            }
            std::process::exit(e.exit_code());
        }
    }
}

/// First signal asks the running command to stop; a second one exits.
async fn handle_signals(shutdown: Shutdown) {
    let first = next_signal().await;
    eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
    shutdown.trigger(first);

    let code = match next_signal().await {
        StopReason::Terminated => ExitCode::TERMINATED,
        _ => ExitCode::INTERRUPTED,
    };
    std::process::exit(code);
}

async fn next_signal() -> StopReason {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => StopReason::Interrupted,
                _ = sigterm.recv() => StopReason::Terminated,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            StopReason::Interrupted
        }
    }
}
