//! Air quality summary model
//!
//! The summary is the single record handed to the presentation layer. It is
//! always well formed: absent readings keep their shape and carry `null`
//! values instead of disappearing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::{ForecastDay, Location};

/// Pollutants tracked by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    O3,
    Pm25,
    Pm10,
}

impl Pollutant {
    pub const ALL: [Pollutant; 3] = [Pollutant::Pm25, Pollutant::Pm10, Pollutant::O3];

    /// Key used in JSON maps and crowd-sensor parameters
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Pollutant::O3 => "o3",
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
        }
    }

    /// Human readable name
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Pollutant::O3 => "O3",
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
        }
    }

    /// Parse the various spellings used by upstream providers
    #[must_use]
    pub fn from_provider_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "o3" | "ozone" => Some(Pollutant::O3),
            "pm25" | "pm2" => Some(Pollutant::Pm25),
            "pm10" => Some(Pollutant::Pm10),
            _ => None,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Health category derived from an AQI value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
    NoData,
}

impl AqiCategory {
    #[must_use]
    pub fn from_aqi(aqi: Option<i32>) -> Self {
        match aqi {
            None => AqiCategory::NoData,
            Some(i32::MIN..=50) => AqiCategory::Good,
            Some(51..=100) => AqiCategory::Moderate,
            Some(101..=150) => AqiCategory::UnhealthyForSensitiveGroups,
            Some(151..=200) => AqiCategory::Unhealthy,
            Some(201..=300) => AqiCategory::VeryUnhealthy,
            Some(_) => AqiCategory::Hazardous,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
            AqiCategory::NoData => "No Data",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Upstream providers that can contribute to a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    AirNow,
    OpenAq,
    OpenMeteo,
    PollenPage,
}

impl Provider {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::AirNow => "AirNow",
            Provider::OpenAq => "OpenAQ",
            Provider::OpenMeteo => "Open-Meteo",
            Provider::PollenPage => "Pollen.com",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One pollutant's resolved value. The category is never stored; it is
/// recomputed from `aqi` whenever the reading is displayed or serialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollutantReading {
    pub aqi: Option<i32>,
    pub concentration: Option<f64>,
    pub unit: String,
}

impl PollutantReading {
    #[must_use]
    pub fn category(&self) -> AqiCategory {
        AqiCategory::from_aqi(self.aqi)
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.aqi.is_some() || self.concentration.is_some()
    }
}

impl Serialize for PollutantReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PollutantReading", 4)?;
        state.serialize_field("aqi", &self.aqi)?;
        state.serialize_field("concentration", &self.concentration)?;
        state.serialize_field("unit", &self.unit)?;
        state.serialize_field("category", self.category().label())?;
        state.end()
    }
}

/// The three tracked readings
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Pollutants {
    pub o3: PollutantReading,
    pub pm25: PollutantReading,
    pub pm10: PollutantReading,
}

impl Pollutants {
    #[must_use]
    pub fn get(&self, pollutant: Pollutant) -> &PollutantReading {
        match pollutant {
            Pollutant::O3 => &self.o3,
            Pollutant::Pm25 => &self.pm25,
            Pollutant::Pm10 => &self.pm10,
        }
    }

    pub fn get_mut(&mut self, pollutant: Pollutant) -> &mut PollutantReading {
        match pollutant {
            Pollutant::O3 => &mut self.o3,
            Pollutant::Pm25 => &mut self.pm25,
            Pollutant::Pm10 => &mut self.pm10,
        }
    }

    /// Worst AQI, with absent readings counting as 0
    #[must_use]
    pub fn overall_aqi(&self) -> i32 {
        Pollutant::ALL
            .iter()
            .map(|p| self.get(*p).aqi.unwrap_or(0))
            .max()
            .unwrap_or(0)
    }

    /// Pollutant with the highest AQI, if any reading has one
    #[must_use]
    pub fn dominant(&self) -> Option<Pollutant> {
        Pollutant::ALL
            .iter()
            .filter_map(|p| self.get(*p).aqi.map(|aqi| (*p, aqi)))
            .fold(None, |best: Option<(Pollutant, i32)>, (p, aqi)| match best {
                Some((_, best_aqi)) if best_aqi >= aqi => best,
                _ => Some((p, aqi)),
            })
            .map(|(p, _)| p)
    }

    #[must_use]
    pub fn any_aqi(&self) -> bool {
        Pollutant::ALL.iter().any(|p| self.get(*p).aqi.is_some())
    }

    #[must_use]
    pub fn any_concentration(&self) -> bool {
        Pollutant::ALL
            .iter()
            .any(|p| self.get(*p).concentration.is_some())
    }
}

/// Pollen severity on a 0-5 scale
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Pollen {
    pub tree: u8,
    pub grass: u8,
    pub weed: u8,
    pub source: String,
}

/// Aggregate root produced by reconciliation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualitySummary {
    pub location: Location,
    pub updated_at: DateTime<Utc>,
    pub has_data: bool,
    pub data_source: String,
    #[serde(rename = "overallAQI")]
    pub overall_aqi: i32,
    pub pollutants: Pollutants,
    pub pollen: Pollen,
    pub forecast: Vec<ForecastDay>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl AirQualitySummary {
    /// Category of the overall index; "No Data" when no pollutant had an AQI
    #[must_use]
    pub fn overall_category(&self) -> AqiCategory {
        if self.pollutants.any_aqi() {
            AqiCategory::from_aqi(Some(self.overall_aqi))
        } else {
            AqiCategory::NoData
        }
    }
}
