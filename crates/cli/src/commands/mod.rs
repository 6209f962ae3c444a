// CLI subcommand dispatch.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use tidewatch_daemon::startup::DaemonPaths;

use crate::exit_code::ExitCode;
use crate::output::OutputFormat;

pub mod queries;
pub mod scan;
pub mod token;

#[derive(Subcommand)]
pub enum Command {
    /// Run one scan cycle and print newly found status URLs
    Scan(scan::ScanArgs),
    /// List configured queries with their known-id counts
    Queries(queries::QueriesArgs),
    /// Manage the bot token stored in the OS keychain
    Token(token::TokenArgs),
}

pub fn run(cmd: Command, format: OutputFormat) -> anyhow::Result<ExitCode> {
    match cmd {
        Command::Scan(args) => scan::run(args, format),
        Command::Queries(args) => queries::run(args, format),
        Command::Token(args) => token::run(args, format),
    }
}

/// Settings and database locations shared by subcommands.
#[derive(Debug, Clone, clap::Args)]
pub struct LocationArgs {
    /// Scanner settings file (JSON, or TOML with a `.toml` extension).
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Known-id database.
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
}

impl LocationArgs {
    /// Explicit paths win; anything else falls back to `~/.tidewatch/`.
    pub fn resolve(&self) -> anyhow::Result<(PathBuf, PathBuf)> {
        if let (Some(settings), Some(db)) = (&self.settings, &self.db) {
            return Ok((settings.clone(), db.clone()));
        }
        let paths = DaemonPaths::resolve()?;
        Ok((
            self.settings.clone().unwrap_or(paths.settings_path),
            self.db.clone().unwrap_or(paths.db_path),
        ))
    }
}

/// Drive a future to completion on a fresh current-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    Ok(runtime.block_on(future))
}
