//! Aggregator push payload
//!
//! Every field except `station` and `winddir` is left out when zero.

use serde::Serialize;
use wxb_core::{to_us, StationMetadata, StationObservation, UnitGroup};

/// Which unit fields an observation payload carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadUnits {
    /// temp, wind, gust, mbar, precip
    #[default]
    Metric,
    /// tempf, windspeedmph, windgustmph, baromin, rainin
    Imperial,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_int(v: &i64) -> bool {
    *v == 0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindyStation {
    pub station: u32,
    #[serde(rename = "shareOption", skip_serializing_if = "String::is_empty")]
    pub share_option: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub latitude: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub longitude: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub elevation: f64,
    #[serde(rename = "tempheight", skip_serializing_if = "is_zero")]
    pub temp_height: f64,
    #[serde(rename = "windheight", skip_serializing_if = "is_zero")]
    pub wind_height: f64,
}

impl WindyStation {
    pub fn new(station: u32, meta: &StationMetadata) -> Self {
        Self {
            station,
            share_option: meta.share_option.clone(),
            name: meta.name.clone(),
            latitude: meta.latitude,
            longitude: meta.longitude,
            elevation: meta.elevation,
            temp_height: meta.temp_height,
            wind_height: meta.wind_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WindyObservation {
    pub station: u32,
    #[serde(skip_serializing_if = "is_zero_int")]
    pub ts: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub temp: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub tempf: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub wind: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub windspeedmph: f64,
    pub winddir: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub gust: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub windgustmph: f64,
    #[serde(skip_serializing_if = "is_zero_int")]
    pub rh: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dewpoint: Option<f64>,
    /// hPa
    #[serde(skip_serializing_if = "is_zero")]
    pub mbar: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub baromin: f64,
    /// mm
    #[serde(skip_serializing_if = "is_zero")]
    pub precip: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub rainin: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub uv: f64,
}

impl WindyObservation {
    pub fn new(station: u32, obs: &StationObservation, units: PayloadUnits) -> Self {
        let base = Self {
            station,
            ts: obs.timestamp,
            winddir: obs.wind_direction,
            rh: obs.humidity as i64,
            dewpoint: obs.dewpoint,
            uv: obs.uv,
            ..Default::default()
        };

        match units {
            PayloadUnits::Metric => Self {
                temp: obs.temperature,
                wind: obs.wind_speed,
                gust: obs.wind_gust,
                mbar: obs.pressure,
                precip: obs.precipitation,
                ..base
            },
            PayloadUnits::Imperial => Self {
                tempf: to_us(obs.temperature, UnitGroup::Temperature),
                windspeedmph: to_us(obs.wind_speed, UnitGroup::Speed),
                windgustmph: to_us(obs.wind_gust, UnitGroup::Speed),
                baromin: to_us(obs.pressure, UnitGroup::Pressure),
                rainin: to_us(obs.precipitation, UnitGroup::Rain),
                ..base
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushEnvelope {
    pub stations: Vec<WindyStation>,
    pub observations: Vec<WindyObservation>,
}
