//! Provider REST client

use crate::wire::{decode_sample, kinds, ObservationsEnvelope, Station, StationsEnvelope, Status};
use crate::{ProviderError, ProviderResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;
use wxb_core::{DeviceId, Observation, Timestamp};

pub struct TempestClient {
    http: Client,
    rest_url: String,
    token: String,
}

impl TempestClient {
    pub fn new(rest_url: impl Into<String>, token: impl Into<String>) -> ProviderResult<Self> {
        let rest_url = rest_url.into().trim_end_matches('/').to_string();
        // fail early on a bad base URL
        Url::parse(&rest_url)?;
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            rest_url,
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.rest_url, path))?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ProviderResult<T> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::HttpStatus { status, body });
        }
        Ok(resp.json::<T>().await?)
    }

    fn check_status(status: &Status) -> ProviderResult<()> {
        if status.code != 0 {
            return Err(ProviderError::Status {
                code: status.code,
                message: status.message.clone(),
            });
        }
        Ok(())
    }

    /// All stations visible to the token
    #[instrument(skip(self))]
    pub async fn get_stations(&self) -> ProviderResult<Vec<Station>> {
        let envelope: StationsEnvelope = self.get_json(self.endpoint("/stations")?).await?;
        Self::check_status(&envelope.status)?;
        debug!(count = envelope.stations.len(), "fetched stations");
        Ok(envelope.stations)
    }

    #[instrument(skip(self))]
    pub async fn get_station(&self, station_id: i64) -> ProviderResult<Station> {
        let url = self.endpoint(&format!("/stations/{station_id}"))?;
        let envelope: StationsEnvelope = self.get_json(url).await?;
        Self::check_status(&envelope.status)?;
        envelope
            .stations
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Validation(format!("no station {station_id} in response")))
    }

    /// Stored observations for a device.
    ///
    /// Without a range the provider returns its latest sample. Malformed
    /// samples are logged and skipped.
    #[instrument(skip(self))]
    pub async fn get_device_observations(
        &self,
        device_id: DeviceId,
        range: Option<(Timestamp, Timestamp)>,
    ) -> ProviderResult<Vec<Observation>> {
        let mut url = self.endpoint(&format!("/observations/device/{device_id}"))?;
        if let Some((start, end)) = range {
            url.query_pairs_mut()
                .append_pair("time_start", &start.to_string())
                .append_pair("time_end", &end.to_string());
        }

        let envelope: ObservationsEnvelope = self.get_json(url).await?;
        Self::check_status(&envelope.status)?;
        validate_observations(&envelope, device_id)?;

        let raw = envelope.obs.unwrap_or_default();
        let mut observations = Vec::with_capacity(raw.len());
        for sample in &raw {
            match decode_sample(sample) {
                Ok(obs) => observations.push(obs),
                Err(e) => warn!(error = %e, "skipping malformed sample"),
            }
        }
        debug!(count = observations.len(), "fetched device observations");
        Ok(observations)
    }
}

fn validate_observations(envelope: &ObservationsEnvelope, device_id: DeviceId) -> ProviderResult<()> {
    if envelope.device_id != device_id {
        return Err(ProviderError::Validation(format!(
            "received device {}, requested {}",
            envelope.device_id, device_id
        )));
    }
    if envelope.kind != kinds::OBS_ST {
        return Err(ProviderError::Validation(format!(
            "received observation type {}, expected {}",
            envelope.kind,
            kinds::OBS_ST
        )));
    }
    if envelope.bucket_step_minutes != 0 {
        return Err(ProviderError::Validation(format!(
            "received bucket_step_minutes {}, expected raw samples",
            envelope.bucket_step_minutes
        )));
    }
    if envelope.source != "db" && envelope.source != "cache" {
        return Err(ProviderError::Validation(format!(
            "received source {}, expected db or cache",
            envelope.source
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    const TOKEN: &str = "test-token";

    fn authorized(q: &HashMap<String, String>) -> bool {
        q.get("token").map(String::as_str) == Some(TOKEN)
    }

    async fn station(Path(id): Path<i64>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        if !authorized(&q) {
            return Json(json!({"status": {"status_code": 401, "status_message": "UNAUTHORIZED"}}));
        }
        Json(json!({
            "status": {"status_code": 0, "status_message": "SUCCESS"},
            "stations": [{
                "station_id": id,
                "public_name": "Hilltop",
                "latitude": 45.5,
                "longitude": -122.6,
                "station_meta": {"elevation": 120.5},
                "devices": [{"device_id": 204604, "device_type": "ST", "device_meta": {"agl": 2.0}}]
            }]
        }))
    }

    async fn device_observations(
        Path(id): Path<i64>,
        Query(q): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let source = if q.contains_key("time_start") && q.contains_key("time_end") {
            "db"
        } else {
            "cache"
        };
        Json(json!({
            "status": {"status_code": 0, "status_message": "SUCCESS"},
            "device_id": id,
            "type": "obs_st",
            "bucket_step_minutes": 0,
            "source": source,
            "obs": [
                [1700000000,0.1,0.5,1.2,270,3,1011.2,8.4,77,0,0,0,0,0,0,0,2.61,1,0,null,null,0],
                [1700000060,0.1,0.5],
                [1700000120,0.2,0.6,1.4,265,3,1011.1,8.3,78,0,0,0,0,0,0,0,2.61,1,0,null,null,0]
            ]
        }))
    }

    async fn wrong_type(Path(id): Path<i64>) -> Json<Value> {
        Json(json!({
            "status": {"status_code": 0},
            "device_id": id,
            "type": "obs_air",
            "source": "db",
            "obs": []
        }))
    }

    async fn start_provider() -> String {
        let app = Router::new()
            .route("/rest/stations/:id", get(station))
            .route("/rest/observations/device/:id", get(device_observations))
            .route("/bad/observations/device/:id", get(wrong_type));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_get_station() {
        let base = start_provider().await;
        let client = TempestClient::new(format!("{base}/rest/"), TOKEN).unwrap();

        let station = client.get_station(77).await.unwrap();
        assert_eq!(station.station_id, 77);
        assert_eq!(station.public_name, "Hilltop");
        assert_eq!(station.metadata(204604, "Open").temp_height, 2.0);
    }

    #[tokio::test]
    async fn test_status_code_is_error() {
        let base = start_provider().await;
        let client = TempestClient::new(format!("{base}/rest"), "wrong").unwrap();

        match client.get_station(77).await {
            Err(ProviderError::Status { code, message }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "UNAUTHORIZED");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_device_observations_skip_malformed() {
        let base = start_provider().await;
        let client = TempestClient::new(format!("{base}/rest"), TOKEN).unwrap();

        let obs = client
            .get_device_observations(204604, Some((1700000000, 1700000200)))
            .await
            .unwrap();
        let timestamps: Vec<_> = obs.iter().map(|o| o.timestamp).collect();
        assert_eq!(timestamps, vec![1700000000, 1700000120]);
    }

    #[tokio::test]
    async fn test_device_observations_validates_envelope() {
        let base = start_provider().await;
        let client = TempestClient::new(format!("{base}/bad"), TOKEN).unwrap();

        assert!(matches!(
            client.get_device_observations(204604, None).await,
            Err(ProviderError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let base = start_provider().await;
        let client = TempestClient::new(format!("{base}/missing"), TOKEN).unwrap();

        assert!(matches!(
            client.get_stations().await,
            Err(ProviderError::HttpStatus { status: 404, .. })
        ));
    }
}
