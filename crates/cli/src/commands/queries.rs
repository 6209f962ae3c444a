// `tidewatch queries`: configured queries and how much each has seen.

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tidewatch_common::Query;
use tidewatch_daemon::config::ScannerConfig;
use tidewatch_daemon::store::KnownIdStore;

use super::LocationArgs;
use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct QueriesArgs {
    #[command(flatten)]
    pub locations: LocationArgs,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueryListing {
    pub key: String,
    pub label: String,
    pub known_ids: usize,
}

pub fn run(args: QueriesArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let (settings_path, db_path) = args.locations.resolve()?;
    let config = ScannerConfig::load_from(&settings_path).with_context(|| {
        format!("failed to load scanner settings from `{}`", settings_path.display())
    })?;

    let store = KnownIdStore::open(&db_path)?;
    let listings = list_queries(&config.queries, &store)?;
    store.close()?;

    output::print_output(format, &listings, |items| format_human(items))?;
    Ok(ExitCode::Success)
}

pub fn list_queries(queries: &[Query], store: &KnownIdStore) -> anyhow::Result<Vec<QueryListing>> {
    queries
        .iter()
        .map(|query| {
            let key = query.key();
            Ok(QueryListing { known_ids: store.count(&key)?, label: query.to_string(), key })
        })
        .collect()
}

fn format_human(listings: &[QueryListing]) -> String {
    if listings.is_empty() {
        return "No queries configured".to_string();
    }
    let width = listings.iter().map(|listing| listing.key.len()).max().unwrap_or(0);
    listings
        .iter()
        .map(|listing| {
            format!("{:<width$}  {:>5} known  {}", listing.key, listing.known_ids, listing.label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
