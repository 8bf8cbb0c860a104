//! `Aircast` - County air quality dashboard core
//!
//! This library pulls readings from regulatory stations, crowd sensors, a
//! gridded forecast model and a scraped pollen page, and reconciles them
//! into one consistent summary per location.

pub mod api;
pub mod aqi;
pub mod cluster;
pub mod config;
pub mod counties;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod models;
pub mod providers;
pub mod reconcile;
pub mod web;

// Re-export core types for public API
pub use aqi::compute_aqi;
pub use cluster::Cluster;
pub use config::AircastConfig;
pub use counties::CountyDirectory;
pub use dashboard::Dashboard;
pub use error::AircastError;
pub use models::{AirQualitySummary, CountyMarker, Location, PollenCardData, Pollutant};
pub use providers::pollen_page::parse_pollen_page;
pub use providers::ProviderError;
pub use reconcile::{ReconcileContext, ReconcileInputs, reconcile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AircastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
