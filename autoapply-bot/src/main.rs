//! autoapply-bot — Telegram front-end for the job-application agent.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use autoapply::config::FsConfigProvider;
use autoapply::store::sqlite::{SqliteCredentialStore, SqliteJobApplicationStore};
use autoapply::store::JobApplicationStore;

mod dispatcher;
mod error;
mod runner;
mod telegram;

use dispatcher::Dispatcher;
use error::{BotError, Result};
use runner::LiveApplyRunner;
use telegram::TelegramApi;

/// autoapply — a chat-driven browser agent that applies to jobs for you
#[derive(Parser)]
#[command(name = "autoapply-bot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration directory (config.json, profile.json, assets)
    #[arg(short, long, env = "AUTOAPPLY_CONFIG_DIR", default_value = "config", global = true)]
    config_dir: PathBuf,

    /// SQLite database path
    #[arg(long, env = "AUTOAPPLY_DB", default_value = "autoapply.db", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration, then start the bot
    Run,

    /// Validate configuration files and probe connectivity
    Validate,

    /// Show recent application records
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("autoapply_bot={level},autoapply={level},warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run => cmd_run(&cli.config_dir, &cli.db).await,
        Commands::Validate => cmd_validate(&cli.config_dir).await,
        Commands::Status => cmd_status(&cli.db),
    }
}

async fn cmd_run(config_dir: &Path, db: &Path) -> Result<()> {
    let provider = FsConfigProvider::new(config_dir);

    let errors = provider.validate();
    if !errors.is_empty() {
        return Err(BotError::Validation(errors));
    }
    let config = provider.get_config()?;

    let job_store = Arc::new(SqliteJobApplicationStore::open(db)?);
    let credential_store = Arc::new(SqliteCredentialStore::open(db)?);

    let transport = Arc::new(TelegramApi::new(&config.bot_token, config.chat_id)?);
    if let Some(username) = transport.get_me().await? {
        println!("Connected as @{username}");
    }

    let runner = Arc::new(LiveApplyRunner::new(
        provider.clone(),
        job_store.clone(),
        credential_store,
    ));
    let mut dispatcher = Dispatcher::new(transport, provider, job_store, runner);

    println!("Bot running. Press Ctrl+C to stop.\n");
    tokio::select! {
        result = dispatcher.run() => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            Ok(())
        }
    }
}

async fn cmd_validate(config_dir: &Path) -> Result<()> {
    let provider = FsConfigProvider::new(config_dir);

    let errors = provider.validate();
    if errors.is_empty() {
        println!("Configuration is valid.");
    } else {
        println!("Configuration problems:");
        for error in &errors {
            println!("  - {error}");
        }
        return Ok(());
    }

    let config = provider.get_config()?;
    println!("Checking connectivity...");
    let report = provider.check_connectivity(&config).await;
    if let Some(username) = &report.bot_username {
        println!("  Telegram: ok (@{username})");
    }
    for error in &report.errors {
        println!("  error: {error}");
    }
    if report.ok {
        println!("All checks passed.");
    }
    Ok(())
}

fn cmd_status(db: &Path) -> Result<()> {
    let store = SqliteJobApplicationStore::open(db)?;
    let records = store.list_all()?;
    if records.is_empty() {
        println!("No applications yet.");
        return Ok(());
    }
    println!("Recent applications:");
    for record in records.iter().take(10) {
        let when = record
            .applied_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!(
            "  [{}] {} — {} ({})",
            record.status, record.company_name, record.job_url, when
        );
        if let Some(reason) = &record.failure_reason {
            println!("      reason: {reason}");
        }
    }
    Ok(())
}
