//! County map marker

use serde::Serialize;

use super::Coordinates;

/// One monitored county on the map. `aqi: None` means no data; `Some(0)`
/// means measured clean.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyMarker {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub aqi: Option<i32>,
    pub unit: String,
    pub county_name: String,
}

impl CountyMarker {
    /// Coordinates when both components are present and finite
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)).filter(Coordinates::is_valid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_aqi_is_not_zero() {
        let marker = CountyMarker {
            lat: Some(37.0),
            lon: Some(-122.0),
            aqi: None,
            unit: "AQI".to_string(),
            county_name: "Test".to_string(),
        };
        let json = serde_json::to_value(&marker).unwrap();
        assert!(json["aqi"].is_null());
        assert_eq!(json["countyName"], "Test");
    }

    #[test]
    fn test_missing_coordinates() {
        let marker = CountyMarker {
            lat: None,
            lon: Some(-122.0),
            aqi: Some(10),
            unit: "AQI".to_string(),
            county_name: "Test".to_string(),
        };
        assert!(marker.coordinates().is_none());
    }
}
