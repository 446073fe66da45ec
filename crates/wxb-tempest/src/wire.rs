//! Provider wire types (REST envelopes and streaming messages)

use serde::{Deserialize, Serialize};
use wxb_core::{DecodeError, DeviceId, Observation, StationMetadata};

/// Streaming message kinds
pub mod kinds {
    pub const CONNECTION_OPENED: &str = "connection_opened";
    pub const ACK: &str = "ack";
    pub const OBS_ST: &str = "obs_st";
    pub const LISTEN_START: &str = "listen_start";
    pub const LISTEN_STOP: &str = "listen_stop";
}

/// One positional sample as sent by the provider. Entries may be `null`.
pub type RawSample = Vec<Option<f64>>;

/// Decode a raw sample, reading `null` entries as zero
pub fn decode_sample(raw: &[Option<f64>]) -> Result<Observation, DecodeError> {
    let values: Vec<f64> = raw.iter().map(|v| v.unwrap_or_default()).collect();
    Observation::from_wire(&values)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(rename = "status_code", default)]
    pub code: i64,
    #[serde(rename = "status_message", default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StationMeta {
    pub share_with_wf: bool,
    pub share_with_wu: bool,
    pub elevation: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceMeta {
    /// height above ground, meters
    pub agl: f64,
    pub name: String,
    pub environment: String,
    pub wifi_network_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Device {
    pub device_id: DeviceId,
    pub serial_number: String,
    pub device_type: String,
    pub hardware_revision: String,
    pub firmware_revision: String,
    pub device_meta: DeviceMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Station {
    pub station_id: i64,
    pub location_id: i64,
    pub name: String,
    pub public_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub timezone_offset_minutes: i32,
    pub station_meta: StationMeta,
    pub devices: Vec<Device>,
    pub is_local_mode: bool,
}

impl Station {
    /// Aggregator-facing metadata. Sensor heights come from the given
    /// device's height above ground.
    pub fn metadata(&self, device_id: DeviceId, share_option: &str) -> StationMetadata {
        let agl = self
            .devices
            .iter()
            .find(|d| d.device_id == device_id)
            .map(|d| d.device_meta.agl)
            .unwrap_or_default();
        let name = if self.public_name.is_empty() {
            self.name.clone()
        } else {
            self.public_name.clone()
        };

        StationMetadata {
            name,
            share_option: share_option.to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            elevation: self.station_meta.elevation,
            temp_height: agl,
            wind_height: agl,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationsEnvelope {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservationsEnvelope {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub device_id: DeviceId,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub bucket_step_minutes: i64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub obs: Option<Vec<RawSample>>,
}

/// Client request on the streaming connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub device_id: DeviceId,
    pub id: String,
}

/// Inbound message on the streaming connection
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    #[serde(default)]
    pub evt: Option<serde_json::Value>,
    #[serde(default)]
    pub obs: Option<Vec<RawSample>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_request_shape() {
        let req = ListenRequest {
            kind: kinds::LISTEN_START,
            device_id: 204604,
            id: "7".into(),
        };
        insta::assert_snapshot!(
            serde_json::to_string(&req).unwrap(),
            @r#"{"type":"listen_start","device_id":204604,"id":"7"}"#
        );
    }

    #[test]
    fn test_stream_message_with_nulls() {
        let json = r#"{
            "type": "obs_st",
            "device_id": 204604,
            "obs": [[1700000000,0.1,0.5,1.2,270,3,1011.2,8.4,77,0,0,0,0,0,0,0,2.61,1,null,null,null,0]]
        }"#;
        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind, kinds::OBS_ST);

        let samples = msg.obs.unwrap();
        let obs = decode_sample(&samples[0]).unwrap();
        assert_eq!(obs.timestamp, 1700000000);
        assert_eq!(obs.relative_humidity, 77);
        assert_eq!(obs.nc_rain_accumulation, 0);
    }

    #[test]
    fn test_station_metadata_uses_device_height() {
        let json = r#"{
            "station_id": 77,
            "name": "Backyard",
            "public_name": "Hilltop",
            "latitude": 45.5,
            "longitude": -122.6,
            "station_meta": {"elevation": 120.5},
            "devices": [
                {"device_id": 1, "device_type": "HB", "device_meta": {"agl": 0}},
                {"device_id": 204604, "device_type": "ST", "device_meta": {"agl": 3.2}}
            ]
        }"#;
        let station: Station = serde_json::from_str(json).unwrap();
        let meta = station.metadata(204604, "Open");

        assert_eq!(meta.name, "Hilltop");
        assert_eq!(meta.share_option, "Open");
        assert_eq!(meta.elevation, 120.5);
        assert_eq!(meta.temp_height, 3.2);
        assert_eq!(meta.wind_height, 3.2);
    }
}
