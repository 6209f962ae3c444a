// Scan engine: fetch each query, extract ids, diff against the known-set.
//
// A cycle walks the configured queries in order, one at a time. Results
// are returned together with the known-set updates they imply; the caller
// decides when to commit those (after delivery in the daemon, right away
// in the one-shot CLI).

pub mod error;
pub mod extract;
pub mod fetch;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tidewatch_common::notify::{self, FormatError, NotificationBatch};
use tidewatch_common::{Query, ScanResult};
use tracing::{debug, info, warn};

use crate::config::{NotifyConfig, ScannerConfig};
use crate::store::KnownIdStore;

pub use error::{ExtractionError, FetchError, ScanError};
pub use fetch::{HttpSearchFetcher, SearchFetcher};

/// How many known ids to retain per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Keep the `n` most recent ids. Ids that fall off may be reported again.
    Bounded(usize),
    Unbounded,
}

impl CachePolicy {
    pub fn from_limit(limit: Option<usize>) -> Self {
        match limit {
            Some(n) => CachePolicy::Bounded(n),
            None => CachePolicy::Unbounded,
        }
    }
}

/// Outcome of diffing one fetch against the known-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownDelta {
    /// Extracted ids absent from the known-set, in discovery order, no duplicates.
    pub new_ids: Vec<String>,
    /// `new_ids` followed by the previous known-set, trimmed per policy.
    pub updated_known: Vec<String>,
}

/// Diff `extracted` against `known`.
///
/// A bounded policy never trims below `new_ids.len()`, so nothing reported
/// in this call can be reported again on the next one.
pub fn scan_for_new<S: AsRef<str>>(
    extracted: &[S],
    known: &[String],
    policy: CachePolicy,
) -> KnownDelta {
    let known_set: HashSet<&str> = known.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let new_ids: Vec<String> = extracted
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| !known_set.contains(id) && seen.insert(*id))
        .map(str::to_string)
        .collect();

    let mut updated_known = Vec::with_capacity(new_ids.len() + known.len());
    updated_known.extend(new_ids.iter().cloned());
    updated_known.extend(known.iter().cloned());
    if let CachePolicy::Bounded(limit) = policy {
        updated_known.truncate(limit.max(new_ids.len()));
    }

    KnownDelta { new_ids, updated_known }
}

/// Known-set write implied by a scan, applied by [`Cycle::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpdate {
    pub key: String,
    pub known: Vec<String>,
}

/// One query's scan output plus its pending store write (only when new ids
/// were found).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryScan {
    pub result: ScanResult,
    pub staged: Option<StagedUpdate>,
}

/// A message together with the keys of the queries whose ids it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBatch {
    pub batch: NotificationBatch,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub query: Query,
    pub error: ScanError,
}

/// Everything one pass over the query list produced.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub started_at: DateTime<Utc>,
    pub results: Vec<ScanResult>,
    pub failures: Vec<QueryFailure>,
    staged: Vec<StagedUpdate>,
}

impl Cycle {
    /// All new ids across queries, in query then discovery order.
    pub fn new_ids(&self) -> Vec<String> {
        self.results.iter().flat_map(|result| result.new_ids.iter().cloned()).collect()
    }

    pub fn status_urls(&self) -> Vec<String> {
        self.results.iter().flat_map(ScanResult::status_urls).collect()
    }

    pub fn has_new_ids(&self) -> bool {
        self.results.iter().any(|result| !result.is_empty())
    }

    pub fn has_extraction_failure(&self) -> bool {
        self.failures.iter().any(|failure| failure.error.is_extraction())
    }

    pub fn staged(&self) -> &[StagedUpdate] {
        &self.staged
    }

    /// Messages for this cycle. `header` goes on the first message only;
    /// nothing is produced when no query found anything.
    pub fn batches(
        &self,
        config: &NotifyConfig,
        header: Option<&str>,
    ) -> Result<Vec<PlannedBatch>, FormatError> {
        let found = self.results.iter().filter(|result| !result.is_empty());
        let (items, owners): (Vec<String>, Vec<String>) = if config.include_summary {
            found
                .flat_map(|result| {
                    let key = result.query.key();
                    summary_items(result, config.chunk_size)
                        .into_iter()
                        .map(move |item| (item, key.clone()))
                })
                .unzip()
        } else {
            found
                .flat_map(|result| {
                    let key = result.query.key();
                    result.status_urls().into_iter().map(move |url| (url, key.clone()))
                })
                .unzip()
        };
        let chunk = if config.include_summary { 1 } else { config.chunk_size };

        let batches = notify::batches(&items, chunk, header)?;
        Ok(batches
            .into_iter()
            .zip(owners.chunks(chunk))
            .map(|(batch, group)| {
                let mut keys: Vec<String> = Vec::new();
                for key in group {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
                PlannedBatch { batch, keys }
            })
            .collect())
    }

    /// Write every staged known-set update. Returns how many keys changed.
    pub fn commit(&self, store: &mut KnownIdStore) -> Result<usize, ScanError> {
        self.commit_except(store, &HashSet::new())
    }

    /// Write staged updates for every key not in `withheld`. A withheld
    /// query keeps its old known-set, so its new ids are found again next
    /// cycle.
    pub fn commit_except(
        &self,
        store: &mut KnownIdStore,
        withheld: &HashSet<String>,
    ) -> Result<usize, ScanError> {
        let mut changed = 0;
        for update in self.staged.iter().filter(|update| !withheld.contains(&update.key)) {
            store
                .replace(&update.key, &update.known)
                .map_err(|error| ScanError::persistence(&error))?;
            debug!(key = %update.key, retained = update.known.len(), "committed known ids");
            changed += 1;
        }
        Ok(changed)
    }
}

/// A per-query summary split so each piece carries at most `chunk_size`
/// status URLs. Continuation pieces repeat the query label.
fn summary_items(result: &ScanResult, chunk_size: usize) -> Vec<String> {
    result
        .new_ids
        .chunks(chunk_size.max(1))
        .map(|group| notify::scan_summary(&result.query, group))
        .collect()
}

/// Runs queries against a [`SearchFetcher`] and diffs them against a store.
#[derive(Debug)]
pub struct ScanEngine<'a, F> {
    config: &'a ScannerConfig,
    fetcher: F,
}

impl<'a, F: SearchFetcher> ScanEngine<'a, F> {
    pub fn new(config: &'a ScannerConfig, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    pub fn config(&self) -> &ScannerConfig {
        self.config
    }

    pub fn policy(&self) -> CachePolicy {
        CachePolicy::from_limit(self.config.cache.max_ids_per_query)
    }

    /// Fetch, extract and diff a single query. The store is only read.
    pub async fn scan_query(
        &self,
        query: &Query,
        store: &KnownIdStore,
    ) -> Result<QueryScan, ScanError> {
        let key = query.key();
        let url = query
            .search_url(&self.config.search.base_url)
            .map_err(|error| ScanError::InvalidQuery {
                key: key.clone(),
                message: error.to_string(),
            })?;

        let payload = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|source| ScanError::Network { key: key.clone(), source })?;
        let extracted = extract::extract_ids(&payload)
            .map_err(|source| ScanError::Extraction { key: key.clone(), source })?;

        let known = store.load(&key).map_err(|error| ScanError::persistence(&error))?;
        let delta = scan_for_new(&extracted, &known, self.policy());
        debug!(
            key = %key,
            extracted = extracted.len(),
            known = known.len(),
            new = delta.new_ids.len(),
            "scanned query"
        );

        let staged = (!delta.new_ids.is_empty())
            .then(|| StagedUpdate { key: key.clone(), known: delta.updated_known });
        Ok(QueryScan { result: ScanResult::new(query.clone(), delta.new_ids), staged })
    }

    /// One pass over every configured query.
    ///
    /// Per-query failures are logged and collected; only a store failure
    /// ends the cycle early.
    pub async fn run_cycle(&self, store: &KnownIdStore) -> Result<Cycle, ScanError> {
        let mut cycle = Cycle {
            started_at: Utc::now(),
            results: Vec::with_capacity(self.config.queries.len()),
            failures: Vec::new(),
            staged: Vec::new(),
        };

        for query in &self.config.queries {
            match self.scan_query(query, store).await {
                Ok(scan) => {
                    cycle.results.push(scan.result);
                    cycle.staged.extend(scan.staged);
                }
                Err(error) if error.is_cycle_fatal() => return Err(error),
                Err(error) => {
                    warn!(query = %query, %error, "query scan failed, skipping");
                    cycle.failures.push(QueryFailure { query: query.clone(), error });
                }
            }
        }

        info!(
            queries = self.config.queries.len(),
            new_ids = cycle.results.iter().map(|r| r.new_ids.len()).sum::<usize>(),
            failures = cycle.failures.len(),
            "scan cycle complete"
        );
        Ok(cycle)
    }
}
