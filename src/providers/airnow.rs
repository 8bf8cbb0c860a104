//! Regulatory station feed (AirNow)

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::{ProviderError, Result, get_json};
use crate::config::ProvidersConfig;
use crate::models::{Coordinates, Pollutant, Provider, StationForecast, StationObservation};

const MISSING_KEY: &str = "AIRNOW_API_KEY not set";
const NO_VALUE: i32 = -1;

/// Raw observation record as returned by AirNow
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawObservation {
    date_observed: Option<String>,
    hour_observed: Option<u32>,
    local_time_zone: Option<String>,
    parameter_name: String,
    #[serde(rename = "AQI")]
    aqi: Option<i32>,
    concentration: Option<f64>,
    unit: Option<String>,
}

/// Raw forecast record as returned by AirNow
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawForecast {
    date_forecast: String,
    parameter_name: String,
    #[serde(rename = "AQI")]
    aqi: Option<i32>,
}

/// AirNow client
pub struct AirNowClient {
    client: ClientWithMiddleware,
    api_key: Option<String>,
    base_url: String,
    radius_miles: u32,
    tz: Tz,
}

impl AirNowClient {
    pub fn new(client: ClientWithMiddleware, config: &ProvidersConfig, tz: Tz) -> Self {
        Self {
            client,
            api_key: config
                .airnow_api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            base_url: config.airnow_base_url.trim_end_matches('/').to_string(),
            radius_miles: config.search_radius_miles,
            tz,
        }
    }

    fn url(&self, path: &str, at: Coordinates, key: &str, extra: &str) -> String {
        format!(
            "{}/aq/{}?format=application/json&latitude={}&longitude={}&distance={}&API_KEY={}{}",
            self.base_url,
            path,
            at.lat,
            at.lon,
            self.radius_miles,
            urlencoding::encode(key),
            extra
        )
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredential(MISSING_KEY.to_string()))
    }

    /// Current observations near a point. The only error that leaves this
    /// call is a missing or rejected credential.
    #[instrument(skip(self), fields(lat = at.lat, lon = at.lon))]
    pub async fn observations(&self, at: Coordinates) -> Result<Vec<StationObservation>> {
        let key = self.key()?;
        let url = self.url("observation/latLong/current/", at, key, "");

        match get_json::<Vec<RawObservation>>(self.client.get(&url)).await {
            Ok(raw) => {
                let observations: Vec<StationObservation> = raw
                    .into_iter()
                    .filter_map(|r| self.to_observation(r))
                    .collect();
                info!("{} returned {} observations", Provider::AirNow, observations.len());
                Ok(observations)
            }
            Err(err) => soften(err).map(|()| Vec::new()),
        }
    }

    /// Daily forecast entries starting at `from`
    #[instrument(skip(self), fields(lat = at.lat, lon = at.lon))]
    pub async fn forecast(&self, at: Coordinates, from: NaiveDate) -> Vec<StationForecast> {
        let Ok(key) = self.key() else {
            debug!("Skipping {} forecast without a credential", Provider::AirNow);
            return Vec::new();
        };
        let url = self.url("forecast/latLong/", at, key, &format!("&date={}", from.format("%Y-%m-%d")));

        match get_json::<Vec<RawForecast>>(self.client.get(&url)).await {
            Ok(raw) => raw.into_iter().filter_map(to_forecast).collect(),
            Err(err) => {
                warn!("{} forecast unavailable: {}", Provider::AirNow, err);
                Vec::new()
            }
        }
    }

    fn to_observation(&self, raw: RawObservation) -> Option<StationObservation> {
        let pollutant = Pollutant::from_provider_name(&raw.parameter_name)?;
        let observed_at = raw.date_observed.as_deref().and_then(|day| {
            let date = NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d").ok()?;
            let time = NaiveTime::from_hms_opt(raw.hour_observed?, 0, 0)?;
            let zone = raw
                .local_time_zone
                .as_deref()
                .and_then(reporting_zone)
                .unwrap_or(self.tz);
            zone.from_local_datetime(&date.and_time(time))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        });
        Some(StationObservation {
            pollutant,
            aqi: raw.aqi.filter(|aqi| *aqi != NO_VALUE && *aqi >= 0),
            concentration: raw.concentration.filter(|c| c.is_finite() && *c >= 0.0),
            unit: raw.unit,
            observed_at,
        })
    }
}

/// Zone for a reporting-area abbreviation. Standard and daylight names map
/// to the same zone so the local hour resolves with the right offset.
fn reporting_zone(abbreviation: &str) -> Option<Tz> {
    use chrono_tz::America;
    use chrono_tz::Pacific;

    match abbreviation.trim().to_ascii_uppercase().as_str() {
        "EST" | "EDT" => Some(America::New_York),
        "CST" | "CDT" => Some(America::Chicago),
        "MST" | "MDT" => Some(America::Denver),
        "PST" | "PDT" => Some(America::Los_Angeles),
        "AKST" | "AKDT" => Some(America::Anchorage),
        "HST" => Some(Pacific::Honolulu),
        "AST" => Some(America::Puerto_Rico),
        _ => None,
    }
}

fn to_forecast(raw: RawForecast) -> Option<StationForecast> {
    let date = NaiveDate::parse_from_str(raw.date_forecast.trim(), "%Y-%m-%d").ok()?;
    Some(StationForecast {
        date,
        pollutant_name: raw.parameter_name.trim().to_string(),
        aqi: raw.aqi.filter(|aqi| *aqi != NO_VALUE && *aqi >= 0),
    })
}

/// Keep credential rejections, swallow everything else
fn soften(err: ProviderError) -> Result<()> {
    match err {
        ProviderError::Status(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
            warn!("{} rejected the configured API key", Provider::AirNow);
            Err(ProviderError::MissingCredential(MISSING_KEY.to_string()))
        }
        err if err.is_configuration() => Err(err),
        err => {
            warn!("{} observations unavailable: {}", Provider::AirNow, err);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::build_client;

    fn client(key: Option<&str>) -> AirNowClient {
        let config = ProvidersConfig {
            airnow_api_key: key.map(str::to_string),
            airnow_base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 1,
            max_retries: 0,
            ..Default::default()
        };
        AirNowClient::new(
            build_client(&config).unwrap(),
            &config,
            chrono_tz::America::Los_Angeles,
        )
    }

    #[tokio::test]
    async fn test_missing_key_is_distinguishable() {
        let err = client(None)
            .observations(Coordinates::new(37.77, -122.42))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential(ref m) if m.contains("AIRNOW_API_KEY")));

        let blank = client(Some("  "))
            .observations(Coordinates::new(37.77, -122.42))
            .await;
        assert!(blank.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_soft() {
        let observations = client(Some("key"))
            .observations(Coordinates::new(37.77, -122.42))
            .await
            .unwrap();
        assert!(observations.is_empty());

        let forecast = client(Some("key"))
            .forecast(
                Coordinates::new(37.77, -122.42),
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            )
            .await;
        assert!(forecast.is_empty());
    }

    #[test]
    fn test_observation_parsing() {
        let payload = r#"[
            {"DateObserved":"2024-05-01 ","HourObserved":13,"LocalTimeZone":"PST",
             "ParameterName":"PM2.5","AQI":42,"Category":{"Number":1,"Name":"Good"}},
            {"DateObserved":"2024-05-01 ","HourObserved":13,"LocalTimeZone":"PST",
             "ParameterName":"O3","AQI":-1,"Category":{"Number":1,"Name":"Good"}},
            {"DateObserved":"2024-05-01 ","HourObserved":13,"LocalTimeZone":"PST",
             "ParameterName":"NO2","AQI":10,"Category":{"Number":1,"Name":"Good"}}
        ]"#;
        let raw: Vec<RawObservation> = serde_json::from_str(payload).unwrap();
        let parsed: Vec<_> = raw
            .into_iter()
            .filter_map(|r| client(None).to_observation(r))
            .collect();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].pollutant, Pollutant::Pm25);
        assert_eq!(parsed[0].aqi, Some(42));
        assert_eq!(
            parsed[0].observed_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap())
        );
        assert_eq!(parsed[1].pollutant, Pollutant::O3);
        assert_eq!(parsed[1].aqi, None);
    }

    #[test]
    fn test_observation_uses_reporting_zone() {
        let payload = r#"[
            {"DateObserved":"2024-05-01 ","HourObserved":13,"LocalTimeZone":"EST",
             "ParameterName":"PM2.5","AQI":30},
            {"DateObserved":"2024-01-15 ","HourObserved":13,"LocalTimeZone":"MST",
             "ParameterName":"PM10","AQI":12},
            {"DateObserved":"2024-05-01 ","HourObserved":13,"LocalTimeZone":"XYZ",
             "ParameterName":"O3","AQI":25}
        ]"#;
        let raw: Vec<RawObservation> = serde_json::from_str(payload).unwrap();
        let parsed: Vec<_> = raw
            .into_iter()
            .filter_map(|r| client(None).to_observation(r))
            .collect();

        assert_eq!(
            parsed[0].observed_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 17, 0, 0).unwrap())
        );
        assert_eq!(
            parsed[1].observed_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap())
        );
        // unknown abbreviation falls back to the reference zone
        assert_eq!(
            parsed[2].observed_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_forecast_parsing() {
        let payload = r#"[
            {"DateIssue":"2024-05-01 ","DateForecast":"2024-05-02 ","ParameterName":"O3","AQI":40},
            {"DateIssue":"2024-05-01 ","DateForecast":"2024-05-02 ","ParameterName":"PM2.5","AQI":-1},
            {"DateIssue":"2024-05-01 ","DateForecast":"garbage","ParameterName":"PM10","AQI":20}
        ]"#;
        let raw: Vec<RawForecast> = serde_json::from_str(payload).unwrap();
        let parsed: Vec<_> = raw.into_iter().filter_map(to_forecast).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(parsed[0].aqi, Some(40));
        assert_eq!(parsed[1].aqi, None);
    }

    #[test]
    fn test_rejected_key_becomes_missing_credential() {
        let err = soften(ProviderError::Status(StatusCode::UNAUTHORIZED)).unwrap_err();
        assert!(err.is_configuration());
        assert!(soften(ProviderError::Status(StatusCode::BAD_GATEWAY)).is_ok());
    }
}
