//! Per-observation fan-out: store every sample, forward throttled ones

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use wxb_core::{
    DeviceId, ForwardOutcome, Forwarder, Observation, ObservationSink, ObservationSource,
    SaveOutcome, StationMetadata, StationObservation, Throttle,
};

/// Running totals, logged when a stream ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub received: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub forwarded: u64,
    pub rejected: u64,
}

/// Scheduler owns the sink, the forwarder and the throttle state. It
/// outlives individual subscriptions so a reconnect keeps its spacing.
pub struct Scheduler {
    sink: Box<dyn ObservationSink>,
    forwarder: Box<dyn Forwarder>,
    station: StationMetadata,
    device_id: DeviceId,
    throttle: Throttle,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(
        sink: Box<dyn ObservationSink>,
        forwarder: Box<dyn Forwarder>,
        station: StationMetadata,
        device_id: DeviceId,
        throttle: Throttle,
    ) -> Self {
        Self {
            sink,
            forwarder,
            station,
            device_id,
            throttle,
            stats: SchedulerStats::default(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Drain `source` until it ends. Returns early on the first fatal error.
    pub async fn run(&mut self, source: &mut dyn ObservationSource) -> Result<()> {
        info!(device_id = self.device_id, window = self.throttle.window(), "scheduler started");
        while let Some(obs) = source.next_observation().await {
            self.handle(&obs).await?;
        }
        info!(stats = ?self.stats, "observation stream ended");
        Ok(())
    }

    /// Store one observation, then forward it if the throttle window has
    /// elapsed. A duplicate is not an error.
    pub async fn handle(&mut self, obs: &Observation) -> Result<()> {
        self.stats.received += 1;

        let saved = self
            .sink
            .save(self.device_id, obs)
            .await
            .with_context(|| format!("failed to store observation at {}", obs.timestamp))?;
        match saved {
            SaveOutcome::Inserted => self.stats.inserted += 1,
            SaveOutcome::AlreadyExists => {
                self.stats.duplicates += 1;
                info!(timestamp = obs.timestamp, "observation already stored");
            }
        }

        if !self.throttle.is_due(obs.timestamp) {
            debug!(
                timestamp = obs.timestamp,
                elapsed = self.throttle.elapsed(obs.timestamp),
                "forward throttled"
            );
            return Ok(());
        }

        let projected = StationObservation::from(obs);
        let outcome = self
            .forwarder
            .forward(std::slice::from_ref(&self.station), &[projected])
            .await
            .context("aggregator push failed")?;
        match outcome {
            ForwardOutcome::Accepted => {
                self.throttle.record(obs.timestamp);
                self.stats.forwarded += 1;
                debug!(timestamp = obs.timestamp, "observation forwarded");
            }
            ForwardOutcome::Rejected { status, body } => {
                self.stats.rejected += 1;
                warn!(timestamp = obs.timestamp, status, %body, "aggregator rejected observation");
            }
        }
        Ok(())
    }
}
