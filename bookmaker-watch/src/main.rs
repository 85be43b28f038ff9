//! bookmaker-watch - command-line front end
//!
//! Starts one watch session, prints its status messages as they arrive and
//! stops it on Ctrl+C / SIGTERM, or on its own after a session-fatal error.
//! Status lines go to stdout; diagnostics (`RUST_LOG`) go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bookmaker_common::config::{ConfigOverrides, WatchConfig};
use bookmaker_common::status::{self, Severity, StatusLog, StatusReceiver};
use bookmaker_common::time::SystemClock;
use bookmaker_watch::{SessionError, WatchSession};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for bookmaker-watch
#[derive(Parser, Debug)]
#[command(name = "bookmaker-watch")]
#[command(about = "Watch a directory and file new book PDFs as [author]title")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: <config dir>/bookmaker/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to watch (direct children only)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory receiving renamed files; same as input means a timestamped subdirectory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File extension to watch, without the dot (repeatable)
    #[arg(short, long = "extension")]
    extensions: Vec<String>,

    /// Write the session log to <DIR>/<timestamp>_LOG.txt on exit
    #[arg(long, value_name = "DIR")]
    export_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookmaker_watch=info,bookmaker_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    info!(
        "Starting bookmaker-watch v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let overrides = ConfigOverrides {
        config_file: args.config,
        input_dir: args.input,
        output_dir: args.output,
        extensions: args.extensions,
    };
    let config = WatchConfig::resolve(&overrides).context("Failed to load configuration")?;

    let (status_tx, mut status_rx) = status::channel();
    let mut session =
        WatchSession::from_config(&config, status_tx, &SystemClock).context("Invalid watch settings")?;

    let mut log = StatusLog::new();
    let mut outcome = Outcome::default();

    let started = session.start().await;
    outcome.absorb(&mut status_rx, &mut log);
    started.context("Failed to start watch session")?;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(1)));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                outcome.absorb(&mut status_rx, &mut log);
                if outcome.completed || session.is_finished() {
                    warn!("Watch session ended on its own");
                    break;
                }
            }
        }
    }

    match session.stop().await {
        Ok(()) | Err(SessionError::NotRunning(_)) => {}
        Err(e) => error!(error = %e, "Failed to stop watch session cleanly"),
    }

    // The worker has joined, so everything up to COMPLETED is already queued
    outcome.absorb(&mut status_rx, &mut log);
    if !outcome.completed {
        warn!("Status stream ended without a COMPLETED message");
    }

    if let Some(dir) = &args.export_log {
        let path = log
            .export(dir, &SystemClock)
            .with_context(|| format!("Failed to export log to {}", dir.display()))?;
        info!(path = %path.display(), "Log exported");
    }

    if outcome.errors > 0 {
        anyhow::bail!("Watch session reported {} error(s)", outcome.errors);
    }

    info!("Shutdown complete");
    Ok(())
}

/// What the front end has seen on the status channel so far
#[derive(Debug, Default)]
struct Outcome {
    completed: bool,
    errors: usize,
}

impl Outcome {
    /// Print and record every queued message
    fn absorb(&mut self, rx: &mut StatusReceiver, log: &mut StatusLog) {
        while let Some(message) = rx.try_next() {
            println!("{}", message.log_line());
            log.push(&message);
            match message.severity {
                Severity::Error => self.errors += 1,
                Severity::Completed => self.completed = true,
                Severity::Info | Severity::Warning => {}
            }
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
