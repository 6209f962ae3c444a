use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::{DiscordSettings, ScannerConfig};
use crate::notify::{deliver, BatchOutcome, ChatSink, DiscordSink, NotifyTarget};
use crate::scan::{HttpSearchFetcher, ScanEngine, SearchFetcher};
use crate::security::{resolve_bot_token, KeychainTokenStore};
use crate::startup::{DaemonPaths, PidFile};
use crate::store::KnownIdStore;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub new_ids: usize,
    pub failed_queries: usize,
    pub batches_sent: usize,
    /// Messages that can never be delivered. Their ids are still committed.
    pub batches_dropped: usize,
    /// Messages worth retrying. Their queries are withheld from the commit.
    pub batches_failed: usize,
    /// Query keys whose known-set was written.
    pub committed: usize,
    /// Query keys left unchanged so their ids are reported again.
    pub withheld: usize,
}

pub async fn run_standalone() -> Result<()> {
    run_standalone_with_paths(DaemonPaths::resolve()?).await
}

async fn run_standalone_with_paths(paths: DaemonPaths) -> Result<()> {
    let config = ScannerConfig::load_from(&paths.settings_path).with_context(|| {
        format!("failed to load scanner settings from `{}`", paths.settings_path.display())
    })?;
    let discord = DiscordSettings::load_from(&paths.discord_settings_path).with_context(|| {
        format!(
            "failed to load notifier settings from `{}`",
            paths.discord_settings_path.display()
        )
    })?;
    let _pid_file = PidFile::acquire(&paths.pid_path)?;

    let token = resolve_bot_token(&KeychainTokenStore, &discord.discord_bot_token)?;
    let sink = DiscordSink::new(&token, config.search.request_timeout())?;
    match sink.whoami().await {
        Ok(user) => info!(name = %user.username, id = %user.id, "logged in"),
        Err(error) => warn!(%error, "could not verify bot identity, continuing"),
    }

    let fetcher = HttpSearchFetcher::new(&config.search)?;
    let engine = ScanEngine::new(&config, fetcher);
    let target = NotifyTarget::from(&discord);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(());
    });

    info!(
        queries = config.queries.len(),
        interval_secs = config.schedule.interval_secs,
        db_path = %paths.db_path.display(),
        "standalone daemon started"
    );
    run_until_shutdown(&engine, &sink, target, &paths.db_path, shutdown_rx)
        .await
        .context("standalone daemon exited with error")
}

/// Tick on the configured interval until `shutdown` fires.
///
/// Shutdown is only observed between ticks; a tick in progress always
/// runs to completion. Tick failures are logged and the loop carries on.
pub async fn run_until_shutdown<F, S>(
    engine: &ScanEngine<'_, F>,
    sink: &S,
    target: NotifyTarget,
    db_path: &Path,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()>
where
    F: SearchFetcher,
    S: ChatSink,
{
    let mut interval = tokio::time::interval(engine.config().schedule.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                info!("shutdown requested, stopping scan loop");
                return Ok(());
            }
            _ = interval.tick() => {}
        }

        match run_tick(engine, sink, target, db_path).await {
            Ok(report) => info!(
                new_ids = report.new_ids,
                failed_queries = report.failed_queries,
                sent = report.batches_sent,
                dropped = report.batches_dropped,
                committed = report.committed,
                withheld = report.withheld,
                "tick complete"
            ),
            Err(error) => {
                error!(error = %format!("{error:#}"), "tick failed, waiting for next tick")
            }
        }
    }
}

/// One full cycle: scan every query, notify, then persist.
///
/// The store is opened and closed within the tick. A query's known ids are
/// committed once every message carrying its ids was either delivered or
/// dropped as undeliverable. A query with a retryable failure keeps its old
/// known-set, so the same ids are reported again next tick.
pub async fn run_tick<F, S>(
    engine: &ScanEngine<'_, F>,
    sink: &S,
    target: NotifyTarget,
    db_path: &Path,
) -> Result<TickReport>
where
    F: SearchFetcher,
    S: ChatSink,
{
    let mut store = KnownIdStore::open(db_path)?;
    let cycle = engine.run_cycle(&store).await?;

    let header = target.header();
    let planned = cycle.batches(&engine.config().notify, header.as_deref())?;
    let delivery = deliver(
        sink,
        target.channel_id,
        planned.iter().map(|planned| &planned.batch),
        engine.config().notify.inter_batch_delay(),
    )
    .await;

    let withheld: HashSet<String> = planned
        .iter()
        .zip(&delivery.outcomes)
        .filter(|(_, outcome)| **outcome == BatchOutcome::Failed)
        .flat_map(|(planned, _)| planned.keys.iter().cloned())
        .collect();
    if !withheld.is_empty() {
        warn!(
            failed = delivery.failed(),
            withheld = withheld.len(),
            "some notifications were not delivered, keeping those queries' known ids unchanged"
        );
    }
    let committed = cycle.commit_except(&mut store, &withheld)?;
    store.close()?;

    Ok(TickReport {
        new_ids: cycle.results.iter().map(|result| result.new_ids.len()).sum(),
        failed_queries: cycle.failures.len(),
        batches_sent: delivery.sent(),
        batches_dropped: delivery.dropped(),
        batches_failed: delivery.failed(),
        committed,
        withheld: withheld.len(),
    })
}
