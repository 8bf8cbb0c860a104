//! County table and location resolution

use crate::config::CountyEntry;
use crate::models::{Coordinates, Location};

/// Supported counties with their center coordinates
#[derive(Debug, Clone)]
pub struct CountyDirectory {
    entries: Vec<CountyEntry>,
}

impl CountyEntry {
    /// URL path segment for the county ("San Luis Obispo" -> "san-luis-obispo")
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Location record named after the county
    #[must_use]
    pub fn location(&self) -> Location {
        Location::with_country(
            self.latitude,
            self.longitude,
            format!("{} County", self.name),
            self.country.clone(),
        )
    }
}

impl CountyDirectory {
    #[must_use]
    pub fn new(entries: Vec<CountyEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[CountyEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive lookup; a trailing " County" is ignored
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&CountyEntry> {
        let wanted = normalize_name(name);
        self.entries
            .iter()
            .find(|entry| normalize_name(&entry.name) == wanted)
    }

    /// County whose center is closest to the given point by great-circle
    /// distance
    #[must_use]
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<&CountyEntry> {
        self.entries
            .iter()
            .map(|entry| {
                let distance = haversine::distance(
                    haversine::Location {
                        latitude: lat,
                        longitude: lon,
                    },
                    haversine::Location {
                        latitude: entry.latitude,
                        longitude: entry.longitude,
                    },
                    haversine::Units::Kilometers,
                );
                (entry, distance)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(entry, _)| entry)
    }
}

fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let trimmed = lowered
        .strip_suffix(" county")
        .unwrap_or(&lowered)
        .trim();
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
