#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use wxb_core::{
    DeviceId, ForwardOutcome, Forwarder, Observation, ObservationSink, ObservationSource,
    SaveOutcome, StationMetadata, StationObservation, Timestamp,
};

pub const DEVICE: DeviceId = 204604;

pub fn obs(timestamp: Timestamp) -> Observation {
    Observation {
        timestamp,
        wind_avg: 1.5,
        wind_direction: 180,
        air_temperature: 20.0,
        relative_humidity: 50,
        pressure: 1013.25,
        ..Default::default()
    }
}

pub fn station() -> StationMetadata {
    StationMetadata {
        name: "Hilltop".into(),
        share_option: "Open".into(),
        latitude: 45.5,
        longitude: -122.625,
        elevation: 120.5,
        temp_height: 2.0,
        wind_height: 2.0,
    }
}

/// Replays a fixed list of observations
pub struct VecSource(std::vec::IntoIter<Observation>);

impl VecSource {
    pub fn new(timestamps: &[Timestamp]) -> Self {
        Self(timestamps.iter().map(|&ts| obs(ts)).collect::<Vec<_>>().into_iter())
    }
}

#[async_trait::async_trait]
impl ObservationSource for VecSource {
    async fn next_observation(&mut self) -> Option<Observation> {
        self.0.next()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Accept,
    Reject,
    Fail,
}

/// Records every push attempt; answers from a script, then accepts
#[derive(Clone, Default)]
pub struct ScriptedForwarder {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    attempts: Arc<Mutex<Vec<(Vec<StationMetadata>, Vec<StationObservation>)>>>,
}

impl ScriptedForwarder {
    pub fn with_replies(replies: &[Reply]) -> Self {
        let fwd = Self::default();
        fwd.replies.lock().unwrap().extend(replies.iter().copied());
        fwd
    }

    pub fn attempted_timestamps(&self) -> Vec<Timestamp> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, obs)| obs.iter().map(|o| o.timestamp))
            .collect()
    }

    pub fn attempts(&self) -> Vec<(Vec<StationMetadata>, Vec<StationObservation>)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Forwarder for ScriptedForwarder {
    async fn forward(
        &self,
        stations: &[StationMetadata],
        observations: &[StationObservation],
    ) -> Result<ForwardOutcome> {
        self.attempts
            .lock()
            .unwrap()
            .push((stations.to_vec(), observations.to_vec()));
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Accept);
        match reply {
            Reply::Accept => Ok(ForwardOutcome::Accepted),
            Reply::Reject => Ok(ForwardOutcome::Rejected {
                status: 400,
                body: "invalid station".into(),
            }),
            Reply::Fail => Err(anyhow!("connection reset")),
        }
    }
}

/// Sink whose every save fails
pub struct BrokenSink;

#[async_trait::async_trait]
impl ObservationSink for BrokenSink {
    async fn save(&self, _device_id: DeviceId, _observation: &Observation) -> Result<SaveOutcome> {
        Err(anyhow!("disk I/O error"))
    }
}
