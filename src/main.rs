//! Entry point: load configuration, build the service registry, start the
//! periodic scheduler. No business logic here.

use std::path::PathBuf;
use std::time::Duration;

use tnse::shared::AppConfig;
use tnse::wiring::{ServiceRegistry, log_service_status};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_loaded = dotenv::dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!("no .env found, reading configuration from the environment"),
    }

    let cfg = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "configuration load failed, exiting");
        anyhow::anyhow!("configuration error: {e}")
    })?;
    let session_path = PathBuf::from("./session.db");

    let registry = ServiceRegistry::build(&cfg, session_path).await?;
    log_service_status(&registry);

    let Some(scheduler) = registry.scheduler.clone() else {
        warn!("no telegram adapter configured, nothing to schedule; exiting");
        return Ok(());
    };

    let interval = Duration::from_secs(cfg.collection_interval_secs_or_default());
    info!(secs = interval.as_secs(), "starting periodic collection loop");

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let report = scheduler.run_periodic().await;
        info!(
            channels = report.channels_processed,
            posts = report.posts_collected,
            errors = report.errors.len(),
            "collection cycle finished"
        );
    }
}
