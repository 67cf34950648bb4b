//! gitcred - Git credential helper with OAuth support
//!
//! Main entry point for the gitcred CLI. Git invokes it as
//! `gitcred get|store|erase` with the credential protocol on stdin.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gitcred_config::{EnvVars, Settings, parse_bool};
use tokio_util::sync::CancellationToken;

mod commands;
mod prompts;
mod protocol;

use commands::{erase, get, providers, store};

/// Environment variable with a tracing filter (or a boolean) for stderr logging.
const TRACE_ENV: &str = "GITCRED_TRACE";

/// Exit status after Ctrl-C, as a shell reports a SIGINT death.
const INTERRUPTED_EXIT_CODE: i32 = 130;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// gitcred - Git credential helper with OAuth support
#[derive(Parser)]
#[command(name = "gitcred")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Additional config file layered over the user config
    #[arg(long, global = true, env = "GITCRED_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Return a credential for the request on stdin
    Get,

    /// Store the credential on stdin
    Store,

    /// Erase the credential on stdin
    Erase,

    /// List host providers in resolution order
    Providers,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = gitcred_config::load_config(cli.config.as_deref())?;

    // Console (stderr, stdout carries the protocol) + rotating JSON file
    let console_filter = console_filter(cli.verbose);
    let file_log = loaded.config_dir.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir.join("logs"), "gitcred.log");
        tracing_appender::non_blocking(appender)
    });
    let (file_writer, log_guard) = match file_log {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(console_filter)),
        )
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "gitcred=debug,gitcred_core=debug,gitcred_oauth=debug,gitcred_config=debug,warn",
                ))
        }))
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    tracing::debug!(sources = ?loaded.loaded_from(), "Configuration loaded");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted; cancelling");
                cancel.cancel();
            }
        }
    });

    let ctx = commands::Context {
        settings: Arc::new(Settings::from_loaded(loaded, EnvVars::from_process())),
        cancel,
    };

    let command = async {
        match cli.command {
            Commands::Get => get::run(&ctx).await,
            Commands::Store => store::run(&ctx).await,
            Commands::Erase => erase::run(&ctx).await,
            Commands::Providers => providers::run(&ctx).await,
        }
    };

    match until_cancelled(command, &ctx.cancel).await {
        Some(result) => result,
        None => {
            // A prompt blocked on the terminal would hold up runtime shutdown.
            eprintln!("Error: interrupted");
            drop(log_guard);
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}

/// Run `command` unless `cancel` fires first.
async fn until_cancelled<F>(command: F, cancel: &CancellationToken) -> Option<Result<()>>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = command => Some(result),
    }
}

/// Stderr filter: `GITCRED_TRACE` as a filter or boolean, else `--verbose`.
fn console_filter(verbose: bool) -> String {
    const DEBUG: &str = "gitcred=debug,gitcred_core=debug,gitcred_oauth=debug,gitcred_config=debug,warn";
    const QUIET: &str = "gitcred=warn,warn";

    match std::env::var(TRACE_ENV).ok().filter(|v| !v.trim().is_empty()) {
        Some(value) => match parse_bool(&value) {
            Some(true) => DEBUG.to_string(),
            Some(false) => QUIET.to_string(),
            None => value,
        },
        None if verbose => DEBUG.to_string(),
        None => QUIET.to_string(),
    }
}
