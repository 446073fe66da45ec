//! Aggregator forwarder
//!
//! Pushes station metadata and projected observations to the aggregator's
//! station-update endpoint as one JSON document.

pub mod wire;

pub use wire::*;

use anyhow::Result;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use wxb_core::{ForwardOutcome, Forwarder, StationMetadata, StationObservation};

#[derive(Debug, Error)]
pub enum WindyError {
    #[error("Invalid aggregator configuration: {0}")]
    Config(String),

    #[error("Push failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type WindyResult<T> = Result<T, WindyError>;

pub struct WindyForwarder {
    client: Client,
    base_url: String,
    api_key: String,
    station: u32,
    units: PayloadUnits,
}

impl WindyForwarder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        station: u32,
        units: PayloadUnits,
    ) -> WindyResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();
        if base_url.is_empty() {
            return Err(WindyError::Config("empty push url".into()));
        }
        if api_key.is_empty() {
            return Err(WindyError::Config("empty api key".into()));
        }
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
            station,
            units,
        })
    }

    pub fn envelope(
        &self,
        stations: &[StationMetadata],
        observations: &[StationObservation],
    ) -> PushEnvelope {
        PushEnvelope {
            stations: stations
                .iter()
                .map(|s| WindyStation::new(self.station, s))
                .collect(),
            observations: observations
                .iter()
                .map(|o| WindyObservation::new(self.station, o, self.units))
                .collect(),
        }
    }

    /// POST the envelope. A non-2xx status or a body carrying an `error`
    /// member is a rejection; only transport failures are errors.
    #[instrument(skip_all, fields(station = self.station))]
    pub async fn push(&self, envelope: &PushEnvelope) -> WindyResult<ForwardOutcome> {
        // the key is part of the path, keep the URL out of logs
        let url = format!("{}/{}", self.base_url, self.api_key);
        let resp = self.client.post(&url).json(envelope).send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), %body, "aggregator rejected push");
            return Ok(ForwardOutcome::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        if reports_error(&body) {
            warn!(%body, "aggregator reported an error");
            return Ok(ForwardOutcome::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(observations = envelope.observations.len(), "push accepted");
        Ok(ForwardOutcome::Accepted)
    }
}

fn reports_error(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").map(|e| !e.is_null()))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl Forwarder for WindyForwarder {
    async fn forward(
        &self,
        stations: &[StationMetadata],
        observations: &[StationObservation],
    ) -> Result<ForwardOutcome> {
        let envelope = self.envelope(stations, observations);
        Ok(self.push(&envelope).await?)
    }
}
