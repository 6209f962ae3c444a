// `tidewatch scan`: one scan cycle, printed instead of sent.

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tidewatch_common::ScanResult;
use tidewatch_daemon::config::ScannerConfig;
use tidewatch_daemon::scan::{Cycle, HttpSearchFetcher, QueryFailure, ScanEngine, SearchFetcher};
use tidewatch_daemon::store::KnownIdStore;
use tracing::info;

use super::{block_on, LocationArgs};
use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub locations: LocationArgs,

    /// Report new ids without recording them as known.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub started_at: String,
    pub results: Vec<ScanResult>,
    pub status_urls: Vec<String>,
    pub failures: Vec<FailureReport>,
    pub committed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub key: String,
    pub error: String,
}

impl From<&QueryFailure> for FailureReport {
    fn from(failure: &QueryFailure) -> Self {
        Self { key: failure.query.key(), error: failure.error.to_string() }
    }
}

pub fn run(args: ScanArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let (settings_path, db_path) = args.locations.resolve()?;
    let config = ScannerConfig::load_from(&settings_path).with_context(|| {
        format!("failed to load scanner settings from `{}`", settings_path.display())
    })?;

    let engine = ScanEngine::new(&config, HttpSearchFetcher::new(&config.search)?);
    let mut store = KnownIdStore::open(&db_path)?;
    let (exit, report) = block_on(scan_once(&engine, &mut store, args.dry_run))??;
    store.close()?;

    for failure in &report.failures {
        output::print_warning(format, "QUERY_FAILED", &failure.error);
    }
    output::print_output(format, &report, format_human)?;
    Ok(exit)
}

/// One cycle against `store`. New ids are recorded unless this is a dry run
/// or some response could not be parsed.
async fn scan_once<F: SearchFetcher>(
    engine: &ScanEngine<'_, F>,
    store: &mut KnownIdStore,
    dry_run: bool,
) -> anyhow::Result<(ExitCode, ScanReport)> {
    let cycle = engine.run_cycle(store).await?;
    let exit = outcome(&cycle.failures);

    let committed = exit != ExitCode::MalformedResponse && !dry_run && cycle.has_new_ids();
    if committed {
        let changed = cycle.commit(store)?;
        info!(changed, "recorded new ids");
    }
    Ok((exit, report(&cycle, committed)))
}

/// Extraction failures block the commit and map to the malformed-response
/// status. Other failed queries fail the run, but the queries that did
/// succeed are still recorded.
fn outcome(failures: &[QueryFailure]) -> ExitCode {
    if failures.iter().any(|failure| failure.error.is_extraction()) {
        ExitCode::MalformedResponse
    } else if failures.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::Error
    }
}

fn report(cycle: &Cycle, committed: bool) -> ScanReport {
    ScanReport {
        started_at: cycle.started_at.to_rfc3339(),
        results: cycle.results.clone(),
        status_urls: cycle.status_urls(),
        failures: cycle.failures.iter().map(FailureReport::from).collect(),
        committed,
    }
}

fn format_human(report: &ScanReport) -> String {
    if report.status_urls.is_empty() {
        return "No new tweets found".to_string();
    }
    report.status_urls.join("\n")
}
