//! Data models for the Aircast service
//!
//! This module contains the core domain models organized by concern:
//! - Location: Geographic coordinates and metadata
//! - Air quality: Pollutant readings and the reconciled summary
//! - Forecast: Daily forecast entries
//! - Feeds: Normalized provider records
//! - Pollen: Scraped pollen card data
//! - Marker: County map markers

pub mod air_quality;
pub mod feeds;
pub mod forecast;
pub mod location;
pub mod marker;
pub mod pollen;

// Re-export all public types for convenient access
pub use air_quality::{
    AirQualitySummary, AqiCategory, Pollen, Pollutant, PollutantReading, Pollutants, Provider,
};
pub use feeds::{CrowdSensorReading, GriddedSeries, StationForecast, StationObservation};
pub use forecast::ForecastDay;
pub use location::{Coordinates, Location};
pub use marker::CountyMarker;
pub use pollen::{PollenCardData, PollenIndex, PollenPageResult, PollenType, PollenWeather};
