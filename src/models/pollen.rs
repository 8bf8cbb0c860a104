//! Pollen card model filled by the scraped pollen page

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PollenIndex {
    pub level: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PollenType {
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollenWeather {
    pub temperature: String,
    pub wind: String,
    pub humidity: String,
    pub temperature_icon: String,
    pub wind_icon: String,
    pub humidity_icon: String,
    /// CSS transform value of the wind direction arrow, passed through as-is
    pub wind_rotation: String,
}

/// Everything the pollen card shows. Any field may be empty when the page
/// element it comes from was missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PollenCardData {
    pub index: PollenIndex,
    pub types: Vec<PollenType>,
    pub weather: PollenWeather,
}

impl PollenCardData {
    /// Look up a pollen type entry by name
    #[must_use]
    pub fn pollen_type(&self, kind: &str) -> Option<&PollenType> {
        self.types.iter().find(|t| t.kind.eq_ignore_ascii_case(kind))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PollenPageSuccess {
    pub success: bool,
    pub data: PollenCardData,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollenPageFailure {
    pub success: bool,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a pollen page fetch; callers must check `success` before
/// reading card fields
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PollenPageResult {
    Success(PollenPageSuccess),
    Failure(PollenPageFailure),
}

impl PollenPageResult {
    #[must_use]
    pub fn success(data: PollenCardData) -> Self {
        Self::Success(PollenPageSuccess {
            success: true,
            data,
            timestamp: Utc::now(),
        })
    }

    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self::Failure(PollenPageFailure {
            success: false,
            error: error.into(),
            timestamp: Utc::now(),
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn data(&self) -> Option<&PollenCardData> {
        match self {
            Self::Success(success) => Some(&success.data),
            Self::Failure(_) => None,
        }
    }
}

/// Map a pollen count in grains/m³ onto the 0-5 severity scale
#[must_use]
pub fn severity_from_grains(grains: f64) -> u8 {
    match grains {
        g if !g.is_finite() || g <= 0.0 => 0,
        g if g < 10.0 => 1,
        g if g < 50.0 => 2,
        g if g < 200.0 => 3,
        g if g < 500.0 => 4,
        _ => 5,
    }
}
