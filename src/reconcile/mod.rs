//! Reconciliation engine
//!
//! Merges the normalized provider feeds into one `AirQualitySummary`. Each
//! pollutant is resolved through a fixed priority chain:
//!
//! 1. regulatory station AQI
//! 2. regulatory station concentration through the AQI calculator
//! 3. crowd-sensor median over the trailing window
//! 4. gridded-model concentration at the current hour
//!
//! The first step with a value wins. When that step has a concentration but
//! no index (O3 has no breakpoint table) the index comes from the first later
//! step that has one.
//!
//! Reconciliation never fails. Missing feeds only make the summary emptier.

pub mod chain;
pub mod forecast;
pub mod hour_key;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::aqi::{clamp_aqi, compute_aqi};
use crate::models::feeds::value_at;
use crate::models::pollen::severity_from_grains;
use crate::models::{
    AirQualitySummary, CrowdSensorReading, GriddedSeries, Location, Pollen, Pollutant,
    PollutantReading, Pollutants, Provider, StationForecast, StationObservation,
};
use crate::providers::ProviderError;

pub use chain::{FallbackChain, SourceLedger};
pub use forecast::{ForecastAnchor, MAX_FORECAST_DAYS};
pub use hour_key::{find_index_or_last, to_hour_key};

/// Everything one reconciliation call consumes
#[derive(Debug)]
pub struct ReconcileInputs {
    pub location: Location,
    /// Regulatory observations; `Err` only for configuration problems
    pub observations: Result<Vec<StationObservation>, ProviderError>,
    pub station_forecast: Vec<StationForecast>,
    pub crowd: Vec<CrowdSensorReading>,
    pub gridded: Option<GriddedSeries>,
}

impl ReconcileInputs {
    /// Inputs with every feed empty
    #[must_use]
    pub fn empty(location: Location) -> Self {
        Self {
            location,
            observations: Ok(Vec::new()),
            station_forecast: Vec::new(),
            crowd: Vec::new(),
            gridded: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileContext {
    pub now: DateTime<Utc>,
    pub tz: Tz,
    pub crowd_window: TimeDelta,
    pub forecast_days: usize,
}

impl ReconcileContext {
    #[must_use]
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            now,
            tz,
            crowd_window: TimeDelta::hours(3),
            forecast_days: MAX_FORECAST_DAYS,
        }
    }
}

/// A value produced by one step of the pollutant chain
#[derive(Debug, Clone, PartialEq)]
struct Resolution {
    aqi: Option<i32>,
    concentration: Option<f64>,
    unit: String,
    observed_at: Option<DateTime<Utc>>,
}

fn default_unit(pollutant: Pollutant) -> &'static str {
    match pollutant {
        Pollutant::O3 => "ppb",
        Pollutant::Pm25 | Pollutant::Pm10 => "µg/m³",
    }
}

/// Merge all feeds into a summary
#[must_use]
pub fn reconcile(inputs: &ReconcileInputs, ctx: &ReconcileContext) -> AirQualitySummary {
    let mut warnings = Vec::new();
    let observations: &[StationObservation] = match &inputs.observations {
        Ok(observations) => observations,
        Err(e) => {
            warnings.push(e.user_message());
            &[]
        }
    };

    let gridded = inputs.gridded.as_ref().filter(|g| !g.is_empty());
    let model_index = gridded
        .and_then(|g| find_index_or_last(&g.time, &to_hour_key(ctx.now, ctx.tz)));
    let model_time = gridded
        .zip(model_index)
        .and_then(|(g, i)| g.time.get(i))
        .and_then(|stamp| hour_key::parse_model_time(stamp, ctx.tz));

    let window_start = ctx.now - ctx.crowd_window;
    let crowd: Vec<&CrowdSensorReading> = inputs
        .crowd
        .iter()
        .filter(|r| r.value.is_finite() && r.value >= 0.0)
        .filter(|r| r.datetime >= window_start && r.datetime <= ctx.now)
        .collect();

    let chain = pollutant_chain(observations, &crowd, gridded.zip(model_index), model_time);

    let mut ledger = SourceLedger::default();
    let mut freshest: Option<DateTime<Utc>> = None;
    let mut pollutants = Pollutants::default();

    for pollutant in Pollutant::ALL {
        let reading = pollutants.get_mut(pollutant);
        let mut candidates = chain.candidates(pollutant);
        match candidates.next() {
            Some((source, mut resolution)) => {
                debug!("{} resolved from {}", pollutant, source);
                ledger.record(source);
                freshest = freshest.max(resolution.observed_at);
                if resolution.aqi.is_none() {
                    // concentration without a breakpoint table; index from a later step
                    if let Some((aqi_source, aqi)) =
                        candidates.find_map(|(s, r)| r.aqi.map(|aqi| (s, aqi)))
                    {
                        debug!("{} index taken from {}", pollutant, aqi_source);
                        ledger.record(aqi_source);
                        resolution.aqi = Some(aqi);
                    }
                }
                *reading = PollutantReading {
                    aqi: resolution.aqi,
                    concentration: resolution.concentration,
                    unit: resolution.unit,
                };
            }
            None => {
                debug!("{} unavailable from every source", pollutant);
                reading.unit = default_unit(pollutant).to_string();
            }
        }
    }

    let overall_aqi = pollutants.overall_aqi();

    let pollen = gridded
        .zip(model_index)
        .and_then(|(g, i)| resolve_pollen(g, i));
    let pollen_present = pollen.is_some();
    if pollen_present {
        ledger.record(Provider::OpenMeteo);
        freshest = freshest.max(model_time);
    }

    let anchor = ForecastAnchor {
        today: hour_key::local_date(ctx.now, ctx.tz),
        overall_aqi,
        primary: pollutants.dominant(),
    };
    let forecast = match forecast::from_station(&inputs.station_forecast, &anchor, ctx.forecast_days)
    {
        Some(days) => {
            ledger.record(Provider::AirNow);
            days
        }
        None => match gridded
            .and_then(|series| forecast::from_gridded(series, &anchor, ctx.forecast_days))
        {
            Some(days) => {
                ledger.record(Provider::OpenMeteo);
                days
            }
            None => Vec::new(),
        },
    };

    let has_data =
        pollutants.any_aqi() || pollutants.any_concentration() || pollen_present;

    AirQualitySummary {
        location: inputs.location.clone(),
        updated_at: freshest.unwrap_or(ctx.now),
        has_data,
        data_source: ledger.joined(),
        overall_aqi,
        pollutants,
        pollen: pollen.unwrap_or_default(),
        forecast,
        warnings,
    }
}

fn pollutant_chain<'a>(
    observations: &'a [StationObservation],
    crowd: &'a [&'a CrowdSensorReading],
    model: Option<(&'a GriddedSeries, usize)>,
    model_time: Option<DateTime<Utc>>,
) -> FallbackChain<'a, Pollutant, Resolution> {
    FallbackChain::new()
        .then(Provider::AirNow, move |p: Pollutant| station_aqi(observations, p))
        .then(Provider::AirNow, move |p: Pollutant| station_concentration(observations, p))
        .then(Provider::OpenAq, move |p: Pollutant| crowd_median(crowd, p))
        .then(Provider::OpenMeteo, move |p: Pollutant| {
            model.and_then(|(series, index)| model_reading(series, index, p, model_time))
        })
}

/// Most recent observation for a pollutant matching a predicate
fn latest_observation<'a>(
    observations: &'a [StationObservation],
    pollutant: Pollutant,
    usable: impl Fn(&StationObservation) -> bool,
) -> Option<&'a StationObservation> {
    observations
        .iter()
        .filter(|o| o.pollutant == pollutant && usable(o))
        .max_by_key(|o| o.observed_at)
}

fn station_aqi(observations: &[StationObservation], pollutant: Pollutant) -> Option<Resolution> {
    let observation = latest_observation(observations, pollutant, |o| o.aqi.is_some())?;
    Some(Resolution {
        aqi: observation.aqi.map(|aqi| clamp_aqi(f64::from(aqi))),
        concentration: observation.concentration.filter(|c| c.is_finite()),
        unit: observation
            .unit
            .clone()
            .unwrap_or_else(|| default_unit(pollutant).to_string()),
        observed_at: observation.observed_at,
    })
}

fn station_concentration(
    observations: &[StationObservation],
    pollutant: Pollutant,
) -> Option<Resolution> {
    let observation = latest_observation(observations, pollutant, |o| {
        o.concentration.is_some_and(f64::is_finite)
    })?;
    Some(Resolution {
        aqi: compute_aqi(pollutant, observation.concentration),
        concentration: observation.concentration,
        unit: observation
            .unit
            .clone()
            .unwrap_or_else(|| default_unit(pollutant).to_string()),
        observed_at: observation.observed_at,
    })
}

fn crowd_median(crowd: &[&CrowdSensorReading], pollutant: Pollutant) -> Option<Resolution> {
    let mut matching: Vec<&CrowdSensorReading> =
        crowd.iter().copied().filter(|r| r.pollutant == pollutant).collect();
    matching.sort_by(|a, b| a.datetime.cmp(&b.datetime).then(a.value.total_cmp(&b.value)));
    matching.dedup_by(|a, b| a.datetime == b.datetime && a.value == b.value);

    let mut values: Vec<f64> = matching.iter().map(|r| r.value).collect();
    let concentration = median(&mut values)?;

    Some(Resolution {
        aqi: compute_aqi(pollutant, Some(concentration)),
        concentration: Some(concentration),
        unit: matching
            .iter()
            .find_map(|r| r.unit.clone())
            .unwrap_or_else(|| default_unit(pollutant).to_string()),
        observed_at: matching.iter().map(|r| r.datetime).max(),
    })
}

fn model_reading(
    series: &GriddedSeries,
    index: usize,
    pollutant: Pollutant,
    observed_at: Option<DateTime<Utc>>,
) -> Option<Resolution> {
    let concentration = value_at(series.concentration(pollutant), index);
    let aqi = compute_aqi(pollutant, concentration).or_else(|| {
        value_at(series.pollutant_aqi(pollutant), index).map(|v| clamp_aqi(v.round()))
    });
    if concentration.is_none() && aqi.is_none() {
        return None;
    }
    Some(Resolution {
        aqi,
        concentration,
        unit: "µg/m³".to_string(),
        observed_at,
    })
}

fn resolve_pollen(series: &GriddedSeries, index: usize) -> Option<Pollen> {
    let tree = value_at(&series.tree_pollen, index);
    let grass = value_at(&series.grass_pollen, index);
    let weed = value_at(&series.weed_pollen, index);
    if tree.is_none() && grass.is_none() && weed.is_none() {
        return None;
    }
    let severity = |v: Option<f64>| v.map_or(0, severity_from_grains);
    Some(Pollen {
        tree: severity(tree),
        grass: severity(grass),
        weed: severity(weed),
        source: Provider::OpenMeteo.display_name().to_string(),
    })
}

/// Median of the values; sorts in place. Even counts average the middle
/// pair.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        // 13:30 in Los Angeles
        Utc.with_ymd_and_hms(2024, 5, 1, 20, 30, 0).unwrap()
    }

    fn ctx() -> ReconcileContext {
        ReconcileContext::new(now(), chrono_tz::America::Los_Angeles)
    }

    fn location() -> Location {
        Location::new(37.35, -121.95, "Santa Clara".to_string())
    }

    fn observation(pollutant: Pollutant, aqi: Option<i32>, concentration: Option<f64>) -> StationObservation {
        StationObservation {
            pollutant,
            aqi,
            concentration,
            unit: None,
            observed_at: Some(now() - TimeDelta::minutes(30)),
        }
    }

    fn crowd(pollutant: Pollutant, value: f64, minutes_ago: i64) -> CrowdSensorReading {
        CrowdSensorReading {
            pollutant,
            value,
            unit: Some("µg/m³".to_string()),
            datetime: now() - TimeDelta::minutes(minutes_ago),
        }
    }

    fn series() -> GriddedSeries {
        GriddedSeries {
            time: vec![
                "2024-05-01T12:00".to_string(),
                "2024-05-01T13:00".to_string(),
                "2024-05-01T14:00".to_string(),
            ],
            pm2_5: vec![Some(5.0), Some(15.0), Some(30.0)],
            pm10: vec![Some(10.0), Some(40.0), Some(80.0)],
            ozone: vec![Some(60.0), Some(70.0), Some(80.0)],
            us_aqi_ozone: vec![Some(20.0), Some(31.0), Some(40.0)],
            tree_pollen: vec![Some(0.0), Some(120.0), Some(5.0)],
            grass_pollen: vec![Some(0.0), Some(8.0), None],
            weed_pollen: vec![None, None, None],
            ..Default::default()
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&mut [30.0, 10.0, 20.0]), Some(20.0));
        assert_eq!(median(&mut [40.0, 10.0, 30.0, 20.0]), Some(25.0));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_all_absent() {
        let summary = reconcile(&ReconcileInputs::empty(location()), &ctx());
        assert_eq!(summary.overall_aqi, 0);
        assert!(!summary.has_data);
        assert_eq!(summary.data_source, "");
        assert!(summary.forecast.is_empty());
        assert_eq!(summary.updated_at, now());
        assert_eq!(summary.pollutants.pm25.aqi, None);
        assert_eq!(summary.pollutants.pm25.category().label(), "No Data");
        assert_eq!(summary.pollen, Pollen::default());
    }

    #[test]
    fn test_station_aqi_beats_crowd_median() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.observations = Ok(vec![observation(Pollutant::Pm25, Some(42), None)]);
        inputs.crowd = vec![crowd(Pollutant::Pm25, 26.0, 10)];

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.pollutants.pm25.aqi, Some(42));
        assert_eq!(summary.data_source, "AirNow");
    }

    #[test]
    fn test_station_concentration_uses_calculator() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.observations = Ok(vec![observation(Pollutant::Pm10, None, Some(40.0))]);

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.pollutants.pm10.aqi, Some(37));
        assert_eq!(summary.pollutants.pm10.concentration, Some(40.0));
    }

    #[test]
    fn test_crowd_window_and_duplicates() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.crowd = vec![
            crowd(Pollutant::Pm25, 10.0, 20),
            crowd(Pollutant::Pm25, 10.0, 20),
            crowd(Pollutant::Pm25, 20.0, 60),
            crowd(Pollutant::Pm25, 30.0, 150),
            crowd(Pollutant::Pm25, 500.0, 200),
            crowd(Pollutant::Pm25, -999.0, 5),
            crowd(Pollutant::Pm10, 70.0, 5),
        ];

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.pollutants.pm25.concentration, Some(20.0));
        assert_eq!(summary.pollutants.pm10.concentration, Some(70.0));
        assert_eq!(summary.updated_at, now() - TimeDelta::minutes(5));
    }

    #[test]
    fn test_model_fills_remaining_pollutants() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.crowd = vec![crowd(Pollutant::Pm25, 100.0, 10)];
        inputs.gridded = Some(series());

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.pollutants.pm25.concentration, Some(100.0));
        assert_eq!(summary.pollutants.pm10.concentration, Some(40.0));
        assert_eq!(summary.pollutants.pm10.aqi, Some(37));
        assert_eq!(summary.pollutants.o3.concentration, Some(70.0));
        assert_eq!(summary.pollutants.o3.aqi, Some(31));
        assert_eq!(summary.data_source, "OpenAQ, Open-Meteo");
    }

    #[test]
    fn test_overall_is_max_of_pollutants() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.observations = Ok(vec![
            observation(Pollutant::O3, Some(61), None),
            observation(Pollutant::Pm25, Some(88), None),
        ]);

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.overall_aqi, 88);
        assert_eq!(summary.pollutants.pm10.aqi, None);
        assert!(Pollutant::ALL
            .iter()
            .all(|p| summary.overall_aqi >= summary.pollutants.get(*p).aqi.unwrap_or(0)));
    }

    #[test]
    fn test_pollen_uses_current_hour() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.gridded = Some(series());

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.pollen.tree, 3);
        assert_eq!(summary.pollen.grass, 1);
        assert_eq!(summary.pollen.weed, 0);
        assert_eq!(summary.pollen.source, "Open-Meteo");
    }

    #[test]
    fn test_pollen_falls_back_to_last_hour() {
        let mut inputs = ReconcileInputs::empty(location());
        let mut stale = series();
        stale.time = vec![
            "2024-04-30T09:00".to_string(),
            "2024-04-30T10:00".to_string(),
            "2024-04-30T11:00".to_string(),
        ];
        inputs.gridded = Some(stale);

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.pollen.tree, 1);
        assert_eq!(summary.pollen.grass, 0);
        assert_eq!(summary.pollutants.pm25.concentration, Some(30.0));
    }

    #[test]
    fn test_missing_credential_becomes_warning() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.observations = Err(ProviderError::MissingCredential(
            "AIRNOW_API_KEY not set".to_string(),
        ));

        let summary = reconcile(&inputs, &ctx());
        assert!(!summary.has_data);
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("AIRNOW_API_KEY not set"));
    }

    #[test]
    fn test_forecast_today_matches_overall() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.observations = Ok(vec![observation(Pollutant::Pm25, Some(64), None)]);
        inputs.station_forecast = vec![
            StationForecast {
                date: chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                pollutant_name: "PM2.5".to_string(),
                aqi: Some(80),
            },
            StationForecast {
                date: chrono::NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                pollutant_name: "O3".to_string(),
                aqi: Some(45),
            },
        ];

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.forecast.len(), 2);
        assert_eq!(summary.forecast[0].overall_aqi, summary.overall_aqi);
        assert_eq!(summary.forecast[0].day_name, "Today");
        assert_eq!(summary.forecast[1].overall_aqi, 45);
    }

    #[test]
    fn test_crowd_ozone_takes_index_from_model() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.crowd = vec![CrowdSensorReading {
            unit: Some("ppm".to_string()),
            ..crowd(Pollutant::O3, 0.08, 15)
        }];
        inputs.gridded = Some(GriddedSeries {
            time: vec!["2024-05-01T13:00".to_string()],
            us_aqi_ozone: vec![Some(120.0)],
            ..Default::default()
        });

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.pollutants.o3.concentration, Some(0.08));
        assert_eq!(summary.pollutants.o3.unit, "ppm");
        assert_eq!(summary.pollutants.o3.aqi, Some(120));
        assert_eq!(summary.overall_aqi, 120);
        assert_eq!(summary.data_source, "OpenAQ, Open-Meteo");
    }

    #[test]
    fn test_station_ozone_concentration_takes_index_from_model() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.observations = Ok(vec![observation(Pollutant::O3, None, Some(0.07))]);
        inputs.gridded = Some(GriddedSeries {
            time: vec!["2024-05-01T13:00".to_string()],
            us_aqi_ozone: vec![Some(95.0)],
            ..Default::default()
        });

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.pollutants.o3.concentration, Some(0.07));
        assert_eq!(summary.pollutants.o3.aqi, Some(95));
        assert_eq!(summary.data_source, "AirNow, Open-Meteo");
    }

    #[test]
    fn test_model_without_values_is_not_a_source() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.gridded = Some(GriddedSeries {
            time: vec!["2024-05-01T13:00".to_string(), "2024-05-02T13:00".to_string()],
            us_aqi: vec![None, None],
            pm2_5: vec![None, None],
            ..Default::default()
        });

        let summary = reconcile(&inputs, &ctx());
        assert!(!summary.has_data);
        assert_eq!(summary.data_source, "");
        assert!(summary.forecast.is_empty());
    }

    #[test]
    fn test_station_forecast_without_summary_index() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.station_forecast = vec![StationForecast {
            date: chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            pollutant_name: "O3".to_string(),
            aqi: Some(48),
        }];

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.forecast[0].overall_aqi, summary.overall_aqi);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["forecast"][0]["category"], "No Data");
        assert_eq!(json["forecast"][0]["overallAQI"], 0);
    }

    #[test]
    fn test_forecast_falls_back_to_model() {
        let mut inputs = ReconcileInputs::empty(location());
        inputs.gridded = Some(series());

        let summary = reconcile(&inputs, &ctx());
        assert_eq!(summary.forecast.len(), 1);
        assert_eq!(summary.forecast[0].overall_aqi, summary.overall_aqi);
    }
}
