//! Observation queries

use crate::schema::{ObservationRow, MEASUREMENT_COLUMNS};
use crate::{ObservationStore, StoreError, StoreResult};
use futures::TryStreamExt;
use tracing::{debug, info, instrument, warn};
use wxb_core::{DeviceId, Observation, ObservationSink, SaveOutcome, Timestamp};

const INSERT_OBSERVATION: &str = r#"
INSERT INTO observations (
    deviceId, timestamp, windLull, windAvg, windGust, windDirection,
    windSampleInterval, pressure, airTemperature, relativeHumidity, illuminance, uv,
    solarRadiation, rainAccumulation, precipitationType, averageStrikeDistance, strikeCount,
    batteryVolts, reportInterval, localDayRainAccumulation, nCRainAccumulation,
    localDayNCRainAccumulation, precipitationAnalysisType
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

/// Counts from a merge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: u64,
    pub duplicates: u64,
    /// Source rows whose key columns were stored swapped
    pub repaired: u64,
}

/// Device ids stay far below 2000-01-01 as an epoch, and every observation
/// the provider reports is later than that. A row matching this was written
/// with its key columns swapped.
const KEYS_SWAPPED: &str = "deviceId >= 946684800 AND timestamp < 946684800";

fn is_key_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() || db.message().starts_with("UNIQUE constraint failed")
        }
        _ => false,
    }
}

impl ObservationStore {
    /// Insert one observation.
    ///
    /// A primary-key conflict yields `AlreadyExists`; every other failure
    /// is returned as an error.
    #[instrument(skip(self, obs), fields(timestamp = obs.timestamp))]
    pub async fn save(&self, device_id: DeviceId, obs: &Observation) -> StoreResult<SaveOutcome> {
        self.insert_row(&ObservationRow::new(device_id, obs)).await
    }

    async fn insert_row(&self, row: &ObservationRow) -> StoreResult<SaveOutcome> {
        let result = sqlx::query(INSERT_OBSERVATION)
            .bind(row.device_id)
            .bind(row.timestamp)
            .bind(row.wind_lull)
            .bind(row.wind_avg)
            .bind(row.wind_gust)
            .bind(row.wind_direction)
            .bind(row.wind_sample_interval)
            .bind(row.pressure)
            .bind(row.air_temperature)
            .bind(row.relative_humidity)
            .bind(row.illuminance)
            .bind(row.uv)
            .bind(row.solar_radiation)
            .bind(row.rain_accumulation)
            .bind(row.precipitation_type)
            .bind(row.average_strike_distance)
            .bind(row.strike_count)
            .bind(row.battery_volts)
            .bind(row.report_interval)
            .bind(row.local_day_rain_accumulation)
            .bind(row.nc_rain_accumulation)
            .bind(row.local_day_nc_rain_accumulation)
            .bind(row.precipitation_analysis_type)
            .execute(self.pool())
            .await;

        match result {
            Ok(_) => {
                debug!(device_id = row.device_id, "saved observation");
                Ok(SaveOutcome::Inserted)
            }
            Err(e) if is_key_conflict(&e) => {
                debug!(device_id = row.device_id, "observation already stored");
                Ok(SaveOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Observations for a device in `[start, end)`, oldest first
    #[instrument(skip(self))]
    pub async fn range(
        &self,
        device_id: DeviceId,
        start: Timestamp,
        end: Timestamp,
    ) -> StoreResult<Vec<Observation>> {
        let rows = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT * FROM observations
            WHERE deviceId = ? AND timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(device_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;

        debug!(
            "Retrieved {} observations between {} and {}",
            rows.len(),
            start,
            end
        );
        Ok(rows.into_iter().map(Observation::from).collect())
    }

    /// Most recent stored observation for a device
    #[instrument(skip(self))]
    pub async fn latest(&self, device_id: DeviceId) -> StoreResult<Option<Observation>> {
        let row = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT * FROM observations
            WHERE deviceId = ?
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Observation::from))
    }

    /// Number of stored observations across all devices
    pub async fn count(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM observations")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    /// Copy every observation from `source` into this store.
    ///
    /// Sources written before the table carried `deviceId` need
    /// `device_id_override`; when given, it replaces the device id of every
    /// copied row. Rows stored with `deviceId` and `timestamp` swapped are
    /// read back the right way round. Keys already present are skipped.
    #[instrument(skip(self, source))]
    pub async fn merge_from(
        &self,
        source: &ObservationStore,
        device_id_override: Option<DeviceId>,
    ) -> StoreResult<MergeReport> {
        let has_device_column: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('observations') WHERE name = 'deviceId'",
        )
        .fetch_one(source.pool())
        .await?;
        let has_device_column = has_device_column > 0;

        let swapped: i64 = if has_device_column {
            let sql = format!("SELECT COUNT(*) FROM observations WHERE {KEYS_SWAPPED}");
            sqlx::query_scalar(&sql).fetch_one(source.pool()).await?
        } else {
            0
        };
        if swapped > 0 {
            warn!(rows = swapped, "source rows have deviceId and timestamp swapped, repairing");
        }

        let timestamp_expr = if has_device_column {
            format!("CASE WHEN {KEYS_SWAPPED} THEN deviceId ELSE timestamp END")
        } else {
            "timestamp".to_string()
        };
        let device_expr = match (has_device_column, device_id_override) {
            (_, Some(_)) => "?".to_string(),
            (true, None) => format!("CASE WHEN {KEYS_SWAPPED} THEN timestamp ELSE deviceId END"),
            (false, None) => return Err(StoreError::MissingDeviceId),
        };
        let sql = format!(
            "SELECT {device_expr} AS deviceId, {timestamp_expr} AS timestamp, {MEASUREMENT_COLUMNS} \
             FROM observations ORDER BY 2 ASC"
        );

        let mut query = sqlx::query_as::<_, ObservationRow>(&sql);
        if let Some(device_id) = device_id_override {
            query = query.bind(device_id);
        }

        let mut report = MergeReport {
            repaired: swapped as u64,
            ..MergeReport::default()
        };
        let mut rows = query.fetch(source.pool());
        while let Some(row) = rows.try_next().await? {
            match self.insert_row(&row).await? {
                SaveOutcome::Inserted => report.inserted += 1,
                SaveOutcome::AlreadyExists => report.duplicates += 1,
            }
        }

        info!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            repaired = report.repaired,
            "merge finished"
        );
        Ok(report)
    }
}

#[async_trait::async_trait]
impl ObservationSink for ObservationStore {
    async fn save(&self, device_id: DeviceId, observation: &Observation) -> anyhow::Result<SaveOutcome> {
        Ok(ObservationStore::save(self, device_id, observation).await?)
    }
}
