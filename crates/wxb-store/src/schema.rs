//! Observation table layout
//!
//! Column names match the databases written by earlier versions of this
//! system so `merge_from` can read them. Those versions inserted rows
//! positionally with the timestamp first, so their `deviceId` column holds
//! the timestamp and `timestamp` holds the device id. Do not rename
//! columns without updating `merge_from`.

use sqlx::FromRow;
use wxb_core::{DeviceId, Observation};

pub const CREATE_OBSERVATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS observations (
    deviceId INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    windLull REAL,
    windAvg REAL,
    windGust REAL,
    windDirection INTEGER,
    windSampleInterval INTEGER,
    pressure REAL,
    airTemperature REAL,
    relativeHumidity INTEGER,
    illuminance INTEGER,
    uv REAL,
    solarRadiation INTEGER,
    rainAccumulation INTEGER,
    precipitationType INTEGER,
    averageStrikeDistance INTEGER,
    strikeCount INTEGER,
    batteryVolts REAL,
    reportInterval INTEGER,
    localDayRainAccumulation INTEGER,
    nCRainAccumulation INTEGER,
    localDayNCRainAccumulation INTEGER,
    precipitationAnalysisType INTEGER,
    PRIMARY KEY (deviceId, timestamp)
)
"#;

macro_rules! measurement_columns {
    () => {
        "windLull, windAvg, windGust, windDirection, windSampleInterval, pressure, \
         airTemperature, relativeHumidity, illuminance, uv, solarRadiation, rainAccumulation, \
         precipitationType, averageStrikeDistance, strikeCount, batteryVolts, reportInterval, \
         localDayRainAccumulation, nCRainAccumulation, localDayNCRainAccumulation, \
         precipitationAnalysisType"
    };
}

/// Observation columns after the timestamp
pub const MEASUREMENT_COLUMNS: &str = measurement_columns!();

/// Observation columns in wire order, without `deviceId`
pub const OBSERVATION_COLUMNS: &str = concat!("timestamp, ", measurement_columns!());

/// One row of the `observations` table
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ObservationRow {
    #[sqlx(rename = "deviceId")]
    pub device_id: i64,
    pub timestamp: i64,
    #[sqlx(rename = "windLull")]
    pub wind_lull: f64,
    #[sqlx(rename = "windAvg")]
    pub wind_avg: f64,
    #[sqlx(rename = "windGust")]
    pub wind_gust: f64,
    #[sqlx(rename = "windDirection")]
    pub wind_direction: i32,
    #[sqlx(rename = "windSampleInterval")]
    pub wind_sample_interval: i64,
    pub pressure: f64,
    #[sqlx(rename = "airTemperature")]
    pub air_temperature: f64,
    #[sqlx(rename = "relativeHumidity")]
    pub relative_humidity: i32,
    pub illuminance: i32,
    pub uv: f64,
    #[sqlx(rename = "solarRadiation")]
    pub solar_radiation: i32,
    #[sqlx(rename = "rainAccumulation")]
    pub rain_accumulation: i32,
    #[sqlx(rename = "precipitationType")]
    pub precipitation_type: i32,
    #[sqlx(rename = "averageStrikeDistance")]
    pub average_strike_distance: i32,
    #[sqlx(rename = "strikeCount")]
    pub strike_count: i32,
    #[sqlx(rename = "batteryVolts")]
    pub battery_volts: f64,
    #[sqlx(rename = "reportInterval")]
    pub report_interval: i64,
    #[sqlx(rename = "localDayRainAccumulation")]
    pub local_day_rain_accumulation: i32,
    #[sqlx(rename = "nCRainAccumulation")]
    pub nc_rain_accumulation: i32,
    #[sqlx(rename = "localDayNCRainAccumulation")]
    pub local_day_nc_rain_accumulation: i32,
    #[sqlx(rename = "precipitationAnalysisType")]
    pub precipitation_analysis_type: i32,
}

impl ObservationRow {
    pub fn new(device_id: DeviceId, obs: &Observation) -> Self {
        Self {
            device_id,
            timestamp: obs.timestamp,
            wind_lull: obs.wind_lull,
            wind_avg: obs.wind_avg,
            wind_gust: obs.wind_gust,
            wind_direction: obs.wind_direction,
            wind_sample_interval: obs.wind_sample_interval,
            pressure: obs.pressure,
            air_temperature: obs.air_temperature,
            relative_humidity: obs.relative_humidity,
            illuminance: obs.illuminance,
            uv: obs.uv,
            solar_radiation: obs.solar_radiation,
            rain_accumulation: obs.rain_accumulation,
            precipitation_type: obs.precipitation_type,
            average_strike_distance: obs.average_strike_distance,
            strike_count: obs.strike_count,
            battery_volts: obs.battery_volts,
            report_interval: obs.report_interval,
            local_day_rain_accumulation: obs.local_day_rain_accumulation,
            nc_rain_accumulation: obs.nc_rain_accumulation,
            local_day_nc_rain_accumulation: obs.local_day_nc_rain_accumulation,
            precipitation_analysis_type: obs.precipitation_analysis_type,
        }
    }
}

impl From<ObservationRow> for Observation {
    fn from(row: ObservationRow) -> Self {
        Observation {
            timestamp: row.timestamp,
            wind_lull: row.wind_lull,
            wind_avg: row.wind_avg,
            wind_gust: row.wind_gust,
            wind_direction: row.wind_direction,
            wind_sample_interval: row.wind_sample_interval,
            pressure: row.pressure,
            air_temperature: row.air_temperature,
            relative_humidity: row.relative_humidity,
            illuminance: row.illuminance,
            uv: row.uv,
            solar_radiation: row.solar_radiation,
            rain_accumulation: row.rain_accumulation,
            precipitation_type: row.precipitation_type,
            average_strike_distance: row.average_strike_distance,
            strike_count: row.strike_count,
            battery_volts: row.battery_volts,
            report_interval: row.report_interval,
            local_day_rain_accumulation: row.local_day_rain_accumulation,
            nc_rain_accumulation: row.nc_rain_accumulation,
            local_day_nc_rain_accumulation: row.local_day_nc_rain_accumulation,
            precipitation_analysis_type: row.precipitation_analysis_type,
        }
    }
}
