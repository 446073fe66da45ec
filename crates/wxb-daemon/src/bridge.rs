//! Live bridge: subscription lifecycle around the scheduler

use crate::scheduler::Scheduler;
use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};
use wxb_tempest::{
    shutdown_requested, subscribe_with_retry, RetryPolicy, SessionConfig, SessionError,
};

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub session: SessionConfig,
    pub retry: RetryPolicy,
    /// Resubscribe when the provider ends the stream
    pub reconnect: bool,
}

/// Feed live observations into `scheduler` until shutdown, a fatal error,
/// or (without reconnect) the end of the stream.
///
/// A fatal scheduler error flips `shutdown` so the read loop unsubscribes
/// before the error is returned. The wait before resubscribing doubles up to
/// `retry.max_delay` while sessions end without delivering observations, and
/// drops back to `retry.base_delay` once one does.
pub async fn run_bridge(
    scheduler: &mut Scheduler,
    options: &BridgeOptions,
    shutdown: &watch::Sender<bool>,
) -> Result<()> {
    let mut delay = options.retry.base_delay;

    loop {
        if *shutdown.borrow() {
            return Ok(());
        }

        let mut subscription =
            match subscribe_with_retry(&options.session, &options.retry, &shutdown.subscribe()).await
            {
                Ok(sub) => sub,
                Err(SessionError::Cancelled) => {
                    info!("shutdown during subscribe");
                    return Ok(());
                }
                Err(e) => return Err(e).context("failed to subscribe to provider stream"),
            };

        let received_before = scheduler.stats().received;
        let result = scheduler.run(&mut subscription).await;
        if let Err(e) = &result {
            error!(error = %e, "fatal pipeline error, closing subscription");
            shutdown.send_replace(true);
        }
        subscription.join().await;
        result?;

        if *shutdown.borrow() {
            info!(stats = ?scheduler.stats(), "bridge stopped");
            return Ok(());
        }
        if !options.reconnect {
            warn!("provider stream ended, reconnect disabled");
            return Ok(());
        }
        if scheduler.stats().received > received_before {
            delay = options.retry.base_delay;
        }
        info!(?delay, "provider stream ended, resubscribing");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_requested(shutdown.subscribe()) => return Ok(()),
        }
        delay = (delay * 2).min(options.retry.max_delay);
    }
}
