//! Gridded air quality and pollen model (Open-Meteo)

use chrono_tz::Tz;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{ProviderError, get_json};
use crate::config::ProvidersConfig;
use crate::models::{Coordinates, GriddedSeries, Provider};

const HOURLY_FIELDS: &str = "pm10,pm2_5,ozone,us_aqi,us_aqi_pm2_5,us_aqi_pm10,us_aqi_ozone,\
alder_pollen,birch_pollen,grass_pollen,mugwort_pollen,olive_pollen,ragweed_pollen";

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    hourly: Option<HourlyData>,
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HourlyData {
    time: Vec<String>,
    pm10: Vec<Option<f64>>,
    pm2_5: Vec<Option<f64>>,
    ozone: Vec<Option<f64>>,
    us_aqi: Vec<Option<f64>>,
    us_aqi_pm2_5: Vec<Option<f64>>,
    us_aqi_pm10: Vec<Option<f64>>,
    us_aqi_ozone: Vec<Option<f64>>,
    alder_pollen: Vec<Option<f64>>,
    birch_pollen: Vec<Option<f64>>,
    grass_pollen: Vec<Option<f64>>,
    mugwort_pollen: Vec<Option<f64>>,
    olive_pollen: Vec<Option<f64>>,
    ragweed_pollen: Vec<Option<f64>>,
}

/// Open-Meteo air quality client
pub struct OpenMeteoClient {
    client: ClientWithMiddleware,
    base_url: String,
    tz: Tz,
    forecast_days: usize,
}

impl OpenMeteoClient {
    pub fn new(
        client: ClientWithMiddleware,
        config: &ProvidersConfig,
        tz: Tz,
        forecast_days: usize,
    ) -> Self {
        Self {
            client,
            base_url: config.open_meteo_base_url.trim_end_matches('/').to_string(),
            tz,
            forecast_days,
        }
    }

    /// Hourly series in the reference zone, or `None` when the model is
    /// unavailable
    #[instrument(skip(self), fields(lat = at.lat, lon = at.lon))]
    pub async fn series(&self, at: Coordinates) -> Option<GriddedSeries> {
        let url = format!(
            "{}/v1/air-quality?latitude={}&longitude={}&hourly={}&timezone={}&forecast_days={}",
            self.base_url,
            at.lat,
            at.lon,
            HOURLY_FIELDS,
            urlencoding::encode(self.tz.name()),
            self.forecast_days
        );

        let response = get_json::<AirQualityResponse>(self.client.get(&url))
            .await
            .and_then(|response| match response.hourly {
                Some(hourly) if !hourly.time.is_empty() => Ok(hourly),
                _ => Err(ProviderError::Api(
                    response
                        .reason
                        .unwrap_or_else(|| "no hourly data".to_string()),
                )),
            });

        match response {
            Ok(hourly) => {
                info!("{} returned {} hours", Provider::OpenMeteo, hourly.time.len());
                Some(hourly.into_series())
            }
            Err(err) => {
                warn!("{} series unavailable: {}", Provider::OpenMeteo, err);
                None
            }
        }
    }
}

impl HourlyData {
    fn into_series(self) -> GriddedSeries {
        let len = self.time.len();
        GriddedSeries {
            tree_pollen: sum_aligned(len, &[&self.alder_pollen, &self.birch_pollen, &self.olive_pollen]),
            grass_pollen: sum_aligned(len, &[&self.grass_pollen]),
            weed_pollen: sum_aligned(len, &[&self.mugwort_pollen, &self.ragweed_pollen]),
            time: self.time,
            pm2_5: self.pm2_5,
            pm10: self.pm10,
            ozone: self.ozone,
            us_aqi: self.us_aqi,
            us_aqi_pm2_5: self.us_aqi_pm2_5,
            us_aqi_pm10: self.us_aqi_pm10,
            us_aqi_ozone: self.us_aqi_ozone,
        }
    }
}

/// Position-wise sum of aligned series; an hour with no value in any
/// series stays absent
fn sum_aligned(len: usize, groups: &[&Vec<Option<f64>>]) -> Vec<Option<f64>> {
    (0..len)
        .map(|i| {
            groups
                .iter()
                .filter_map(|series| series.get(i).copied().flatten())
                .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v))
        })
        .collect()
}
