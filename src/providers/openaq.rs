//! Crowd-sensor measurement feed (OpenAQ v3)
//!
//! Two steps: nearby locations with their sensor lists, then each
//! location's latest value per sensor. Sensor ids map the latest values
//! back to pollutants.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::get_json;
use crate::config::ProvidersConfig;
use crate::models::{Coordinates, CrowdSensorReading, Pollutant, Provider};

const METERS_PER_MILE: f64 = 1609.344;
/// Upper bound the service accepts for a radius query
const MAX_RADIUS_METERS: u32 = 25_000;
const LOCATION_LIMIT: u32 = 10;
const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    results: Vec<RawLocation>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    id: u64,
    #[serde(default)]
    sensors: Vec<RawSensor>,
}

#[derive(Debug, Deserialize)]
struct RawSensor {
    id: u64,
    parameter: RawParameter,
}

#[derive(Debug, Deserialize)]
struct RawParameter {
    name: String,
    units: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    results: Vec<RawLatest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLatest {
    value: Option<f64>,
    datetime: RawDate,
    sensors_id: u64,
}

#[derive(Debug, Deserialize)]
struct RawDate {
    utc: DateTime<Utc>,
}

/// Pollutant and unit per sensor id
type SensorIndex = HashMap<u64, (Pollutant, Option<String>)>;

/// OpenAQ client
pub struct OpenAqClient {
    client: ClientWithMiddleware,
    api_key: Option<String>,
    base_url: String,
    radius_meters: u32,
}

impl OpenAqClient {
    pub fn new(client: ClientWithMiddleware, config: &ProvidersConfig) -> Self {
        let radius = (f64::from(config.search_radius_miles) * METERS_PER_MILE).round() as u32;
        Self {
            client,
            api_key: config.openaq_api_key.clone(),
            base_url: config.openaq_base_url.trim_end_matches('/').to_string(),
            radius_meters: radius.min(MAX_RADIUS_METERS),
        }
    }

    /// Flat, unsorted list of readings inside `[now - window, now]`.
    /// Entries may still contain duplicates; filtering is left to the
    /// reconciliation engine.
    #[instrument(skip(self), fields(lat = at.lat, lon = at.lon))]
    pub async fn measurements(
        &self,
        at: Coordinates,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Vec<CrowdSensorReading> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("{} skipped: OPENAQ_API_KEY not set", Provider::OpenAq);
            return Vec::new();
        };

        let locations = match self.locations(at, api_key).await {
            Ok(locations) => locations,
            Err(err) => {
                warn!("{} locations unavailable: {}", Provider::OpenAq, err);
                return Vec::new();
            }
        };

        let sensors = sensor_index(&locations);
        let relevant: Vec<u64> = locations
            .iter()
            .filter(|location| location.sensors.iter().any(|s| sensors.contains_key(&s.id)))
            .map(|location| location.id)
            .collect();
        debug!(
            "{} found {} locations, {} with tracked sensors",
            Provider::OpenAq,
            locations.len(),
            relevant.len()
        );

        let latest = join_all(relevant.iter().map(|id| self.latest(*id, api_key))).await;
        let readings = readings_in_window(latest.into_iter().flatten(), &sensors, now - window, now);
        info!("{} returned {} measurements", Provider::OpenAq, readings.len());
        readings
    }

    async fn locations(&self, at: Coordinates, api_key: &str) -> super::Result<Vec<RawLocation>> {
        let url = format!(
            "{}/v3/locations?coordinates={:.4},{:.4}&radius={}&limit={}",
            self.base_url, at.lat, at.lon, self.radius_meters, LOCATION_LIMIT
        );
        let request = self.client.get(&url).header(API_KEY_HEADER, api_key);
        Ok(get_json::<LocationsResponse>(request).await?.results)
    }

    /// Latest values of one location; a failing location contributes nothing
    async fn latest(&self, location_id: u64, api_key: &str) -> Vec<RawLatest> {
        let url = format!("{}/v3/locations/{}/latest", self.base_url, location_id);
        let request = self.client.get(&url).header(API_KEY_HEADER, api_key);
        match get_json::<LatestResponse>(request).await {
            Ok(response) => response.results,
            Err(err) => {
                warn!("{} location {} skipped: {}", Provider::OpenAq, location_id, err);
                Vec::new()
            }
        }
    }
}

fn sensor_index(locations: &[RawLocation]) -> SensorIndex {
    locations
        .iter()
        .flat_map(|location| &location.sensors)
        .filter_map(|sensor| {
            Pollutant::from_provider_name(&sensor.parameter.name)
                .map(|p| (sensor.id, (p, sensor.parameter.units.clone())))
        })
        .collect()
}

fn readings_in_window(
    latest: impl IntoIterator<Item = RawLatest>,
    sensors: &SensorIndex,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<CrowdSensorReading> {
    latest
        .into_iter()
        .filter(|raw| raw.datetime.utc >= from && raw.datetime.utc <= to)
        .filter_map(|raw| {
            let (pollutant, unit) = sensors.get(&raw.sensors_id)?;
            Some(CrowdSensorReading {
                pollutant: *pollutant,
                value: raw.value.filter(|v| v.is_finite())?,
                unit: unit.clone(),
                datetime: raw.datetime.utc,
            })
        })
        .collect()
}
