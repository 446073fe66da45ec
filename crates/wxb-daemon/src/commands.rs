//! Subcommand bodies

use crate::bridge::{run_bridge, BridgeOptions};
use crate::scheduler::Scheduler;
use anyhow::{ensure, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use wxb_config::AppConfig;
use wxb_core::{DeviceId, SaveOutcome, Throttle, Timestamp};
use wxb_store::{MergeReport, ObservationStore};
use wxb_tempest::{RetryPolicy, SessionConfig, TempestClient};
use wxb_windy::{PayloadUnits, WindyForwarder};

/// Largest time range requested from the provider in one call
pub const BACKFILL_CHUNK_SECS: i64 = 5 * 24 * 60 * 60;

/// Live bridge until Ctrl+C or a fatal error
pub async fn run(cfg: &AppConfig) -> Result<()> {
    cfg.validate()?;

    let store = ObservationStore::open(cfg.store_path())
        .await
        .with_context(|| format!("failed to open store {}", cfg.store_path()))?;
    info!(path = %cfg.store_path(), "observation store ready");

    let client = TempestClient::new(cfg.rest_url(), cfg.provider_token())?;
    let station = client
        .get_station(cfg.station_id())
        .await
        .context("failed to fetch station metadata")?;
    let metadata = station.metadata(cfg.device_id(), &cfg.share_option());
    info!(station = %metadata.name, device_id = cfg.device_id(), "station metadata loaded");

    let units = if cfg.imperial() {
        PayloadUnits::Imperial
    } else {
        PayloadUnits::Metric
    };
    let forwarder = WindyForwarder::new(
        cfg.aggregator_url(),
        cfg.aggregator_api_key(),
        cfg.aggregator_station(),
        units,
    )?;

    let mut scheduler = Scheduler::new(
        Box::new(store.clone()),
        Box::new(forwarder),
        metadata,
        cfg.device_id(),
        Throttle::new(cfg.throttle_secs()),
    );
    let options = BridgeOptions {
        session: SessionConfig {
            ws_url: cfg.ws_url(),
            token: cfg.provider_token(),
            device_id: cfg.device_id(),
        },
        retry: RetryPolicy {
            max_attempts: cfg.max_attempts(),
            base_delay: cfg.backoff(),
            ..RetryPolicy::default()
        },
        reconnect: cfg.reconnect(),
    };

    let shutdown = Arc::new(watch::channel(false).0);
    let signal = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown signal received");
                    shutdown.send_replace(true);
                }
                Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
            }
        }
    });

    let result = run_bridge(&mut scheduler, &options, &shutdown).await;
    signal.abort();
    store.close().await;
    result
}

/// Totals from a backfill run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub fetched: u64,
    pub inserted: u64,
    pub duplicates: u64,
}

/// Fetch the last `days` days of observations and store them
pub async fn backfill(cfg: &AppConfig, days: u32) -> Result<BackfillReport> {
    cfg.validate_provider()?;

    let store = ObservationStore::open(cfg.store_path())
        .await
        .with_context(|| format!("failed to open store {}", cfg.store_path()))?;
    let client = TempestClient::new(cfg.rest_url(), cfg.provider_token())?;

    let end = chrono::Utc::now().timestamp();
    let start = end - i64::from(days) * 24 * 60 * 60;
    let report = backfill_range(&client, &store, cfg.device_id(), start, end).await?;

    store.close().await;
    Ok(report)
}

/// Fetch `[start, end]` in chunks and save every observation
pub async fn backfill_range(
    client: &TempestClient,
    store: &ObservationStore,
    device_id: DeviceId,
    start: Timestamp,
    end: Timestamp,
) -> Result<BackfillReport> {
    let mut report = BackfillReport::default();
    let mut chunk_start = start;

    while chunk_start < end {
        let chunk_end = (chunk_start + BACKFILL_CHUNK_SECS).min(end);
        info!(device_id, chunk_start, chunk_end, "fetching observations");

        let observations = client
            .get_device_observations(device_id, Some((chunk_start, chunk_end)))
            .await
            .with_context(|| format!("failed to fetch observations {chunk_start}..{chunk_end}"))?;
        report.fetched += observations.len() as u64;

        for obs in &observations {
            match store.save(device_id, obs).await? {
                SaveOutcome::Inserted => report.inserted += 1,
                SaveOutcome::AlreadyExists => report.duplicates += 1,
            }
        }
        chunk_start = chunk_end;
    }

    info!(?report, "backfill finished");
    Ok(report)
}

/// Copy every observation from `inputs` into the store at `output`
pub async fn merge(
    output: PathBuf,
    inputs: &[PathBuf],
    device_id: Option<DeviceId>,
) -> Result<MergeReport> {
    ensure!(!inputs.is_empty(), "no input databases given");

    let store = ObservationStore::open(&output)
        .await
        .with_context(|| format!("failed to open output {}", output.display()))?;

    let mut total = MergeReport::default();
    for input in inputs {
        let source = ObservationStore::open_read_only(input)
            .await
            .with_context(|| format!("failed to open input {}", input.display()))?;
        let report = store
            .merge_from(&source, device_id)
            .await
            .with_context(|| format!("failed to merge {}", input.display()))?;
        info!(input = %input.display(), ?report, "merged database");
        total.inserted += report.inserted;
        total.duplicates += report.duplicates;
        total.repaired += report.repaired;
        source.close().await;
    }

    store.close().await;
    Ok(total)
}
