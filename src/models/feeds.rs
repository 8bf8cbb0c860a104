//! Normalized provider feed records
//!
//! Each adapter converts its upstream payload into these types before the
//! reconciliation engine sees it. Nothing here knows about HTTP.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Pollutant;

/// A current observation from a regulatory monitoring station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationObservation {
    pub pollutant: Pollutant,
    /// Index reported directly by the station
    pub aqi: Option<i32>,
    pub concentration: Option<f64>,
    pub unit: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// A daily forecast entry from the regulatory network; one per pollutant
/// per day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationForecast {
    pub date: NaiveDate,
    pub pollutant_name: String,
    pub aqi: Option<i32>,
}

/// A single crowd-sensor measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdSensorReading {
    pub pollutant: Pollutant,
    pub value: f64,
    pub unit: Option<String>,
    pub datetime: DateTime<Utc>,
}

/// Hourly gridded-model series. All vectors are positionally aligned with
/// `time`, which holds local hour stamps ("YYYY-MM-DDTHH:MM") in the
/// reference time zone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GriddedSeries {
    pub time: Vec<String>,
    pub pm2_5: Vec<Option<f64>>,
    pub pm10: Vec<Option<f64>>,
    pub ozone: Vec<Option<f64>>,
    pub us_aqi: Vec<Option<f64>>,
    pub us_aqi_pm2_5: Vec<Option<f64>>,
    pub us_aqi_pm10: Vec<Option<f64>>,
    pub us_aqi_ozone: Vec<Option<f64>>,
    /// Pollen counts in grains/m³
    pub tree_pollen: Vec<Option<f64>>,
    pub grass_pollen: Vec<Option<f64>>,
    pub weed_pollen: Vec<Option<f64>>,
}

impl GriddedSeries {
    /// Concentration series for a pollutant
    #[must_use]
    pub fn concentration(&self, pollutant: Pollutant) -> &[Option<f64>] {
        match pollutant {
            Pollutant::O3 => &self.ozone,
            Pollutant::Pm25 => &self.pm2_5,
            Pollutant::Pm10 => &self.pm10,
        }
    }

    /// Model-native per-pollutant AQI series
    #[must_use]
    pub fn pollutant_aqi(&self, pollutant: Pollutant) -> &[Option<f64>] {
        match pollutant {
            Pollutant::O3 => &self.us_aqi_ozone,
            Pollutant::Pm25 => &self.us_aqi_pm2_5,
            Pollutant::Pm10 => &self.us_aqi_pm10,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Value at a position of an aligned series; missing index and null entry
/// both read as absent
#[must_use]
pub fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series
        .get(index)
        .copied()
        .flatten()
        .filter(|v| v.is_finite())
}
