// tidewatchd: looped scanner + notifier.

use anyhow::Context;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("starting tidewatch daemon");
    tidewatch_daemon::runtime::run_standalone()
        .await
        .context("tidewatch daemon terminated unexpectedly")
}
