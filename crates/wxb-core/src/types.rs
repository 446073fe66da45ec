//! Core data types for weather observations

use serde::{Deserialize, Serialize};

use crate::derived::dewpoint;

/// Timestamp type (Unix epoch seconds)
pub type Timestamp = i64;

/// Provider device identifier
pub type DeviceId = i64;

/// Number of fields in one wire sample
pub const WIRE_SAMPLE_LEN: usize = 22;

/// Wire sample decoding error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("wire sample has {actual} fields, expected {expected}")]
    Length { expected: usize, actual: usize },
}

/// One instantaneous sample from a station device.
///
/// Field order and units follow the provider's `obs_st` layout. Values are
/// stored as delivered; nothing is converted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: Timestamp,
    /// m/s
    pub wind_lull: f64,
    /// m/s
    pub wind_avg: f64,
    /// m/s
    pub wind_gust: f64,
    /// degrees
    pub wind_direction: i32,
    /// seconds
    pub wind_sample_interval: i64,
    /// hPa (station pressure)
    pub pressure: f64,
    /// °C
    pub air_temperature: f64,
    /// %
    pub relative_humidity: i32,
    /// lux
    pub illuminance: i32,
    pub uv: f64,
    /// W/m²
    pub solar_radiation: i32,
    pub rain_accumulation: i32,
    pub precipitation_type: i32,
    /// km
    pub average_strike_distance: i32,
    pub strike_count: i32,
    /// volts
    pub battery_volts: f64,
    /// minutes
    pub report_interval: i64,
    pub local_day_rain_accumulation: i32,
    pub nc_rain_accumulation: i32,
    pub local_day_nc_rain_accumulation: i32,
    pub precipitation_analysis_type: i32,
}

impl Observation {
    /// Decode a positional wire sample.
    ///
    /// The sample must have exactly [`WIRE_SAMPLE_LEN`] entries. Integer
    /// fields are truncated toward zero.
    pub fn from_wire(raw: &[f64]) -> Result<Self, DecodeError> {
        if raw.len() != WIRE_SAMPLE_LEN {
            return Err(DecodeError::Length {
                expected: WIRE_SAMPLE_LEN,
                actual: raw.len(),
            });
        }

        Ok(Self {
            timestamp: raw[0] as i64,
            wind_lull: raw[1],
            wind_avg: raw[2],
            wind_gust: raw[3],
            wind_direction: raw[4] as i32,
            wind_sample_interval: raw[5] as i64,
            pressure: raw[6],
            air_temperature: raw[7],
            relative_humidity: raw[8] as i32,
            illuminance: raw[9] as i32,
            uv: raw[10],
            solar_radiation: raw[11] as i32,
            rain_accumulation: raw[12] as i32,
            precipitation_type: raw[13] as i32,
            average_strike_distance: raw[14] as i32,
            strike_count: raw[15] as i32,
            battery_volts: raw[16],
            report_interval: raw[17] as i64,
            local_day_rain_accumulation: raw[18] as i32,
            nc_rain_accumulation: raw[19] as i32,
            local_day_nc_rain_accumulation: raw[20] as i32,
            precipitation_analysis_type: raw[21] as i32,
        })
    }

    pub fn precipitation(&self) -> Option<PrecipitationType> {
        PrecipitationType::from_code(self.precipitation_type)
    }
}

/// Precipitation type code reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationType {
    None,
    Rain,
    Hail,
    RainHail,
}

impl PrecipitationType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Rain),
            2 => Some(Self::Hail),
            3 => Some(Self::RainHail),
            _ => None,
        }
    }
}

/// Identity and placement of the physical station
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StationMetadata {
    pub name: String,
    pub share_option: String,
    pub latitude: f64,
    pub longitude: f64,
    /// meters above sea level
    pub elevation: f64,
    /// meters above ground
    pub temp_height: f64,
    /// meters above ground
    pub wind_height: f64,
}

/// Aggregator-shaped projection of one observation, built per push.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StationObservation {
    pub timestamp: Timestamp,
    /// °C
    pub temperature: f64,
    /// m/s
    pub wind_speed: f64,
    pub wind_direction: i32,
    /// m/s
    pub wind_gust: f64,
    pub humidity: i32,
    /// °C, absent when humidity is zero
    pub dewpoint: Option<f64>,
    /// hPa
    pub pressure: f64,
    /// mm
    pub precipitation: f64,
    pub uv: f64,
}

impl From<&Observation> for StationObservation {
    fn from(obs: &Observation) -> Self {
        let dewpoint = (obs.relative_humidity > 0)
            .then(|| dewpoint(obs.relative_humidity as f64, obs.air_temperature));

        Self {
            timestamp: obs.timestamp,
            temperature: obs.air_temperature,
            wind_speed: obs.wind_avg,
            wind_direction: obs.wind_direction,
            wind_gust: obs.wind_gust,
            humidity: obs.relative_humidity,
            dewpoint,
            pressure: obs.pressure,
            precipitation: obs.rain_accumulation as f64,
            uv: obs.uv,
        }
    }
}
