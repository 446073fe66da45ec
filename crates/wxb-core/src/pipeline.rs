use anyhow::Result;

use crate::{DeviceId, Observation, StationMetadata, StationObservation};

/// Result of persisting one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    /// The (device, timestamp) key was already stored
    AlreadyExists,
}

/// Result of one aggregator push that reached the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Accepted,
    Rejected { status: u16, body: String },
}

#[async_trait::async_trait]
pub trait ObservationSource: Send {
    /// Next observation, or `None` once the producer has finished.
    async fn next_observation(&mut self) -> Option<Observation>;
}

/// Durable observation storage. `Err` is a fatal persistence failure.
#[async_trait::async_trait]
pub trait ObservationSink: Send + Sync {
    async fn save(&self, device_id: DeviceId, observation: &Observation) -> Result<SaveOutcome>;
}

/// Aggregator push. `Err` is a transport failure.
#[async_trait::async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        stations: &[StationMetadata],
        observations: &[StationObservation],
    ) -> Result<ForwardOutcome>;
}
