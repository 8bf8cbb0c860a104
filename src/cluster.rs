//! Greedy single-pass clustering of map markers
//!
//! Markers are visited in input order. Each unassigned marker seeds a new
//! cluster and absorbs every later unassigned marker within the threshold
//! of the seed position. The neighbor test always uses the seed, while the
//! reported center is the running mean of all members.

use serde::Serialize;

use crate::models::{Coordinates, CountyMarker};

/// Anything with an optional map position
pub trait Located {
    fn position(&self) -> Option<Coordinates>;
}

impl Located for CountyMarker {
    fn position(&self) -> Option<Coordinates> {
        self.coordinates()
    }
}

impl Located for Coordinates {
    fn position(&self) -> Option<Coordinates> {
        Some(*self).filter(Coordinates::is_valid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster<T> {
    pub center: Coordinates,
    pub markers: Vec<T>,
}

impl<T> Cluster<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Group markers whose Euclidean degree distance to a seed is at most
/// `threshold_degrees`. Markers without coordinates are dropped.
#[must_use]
pub fn cluster<T: Located + Clone>(markers: &[T], threshold_degrees: f64) -> Vec<Cluster<T>> {
    let located: Vec<(Coordinates, &T)> = markers
        .iter()
        .filter_map(|m| m.position().map(|p| (p, m)))
        .collect();
    let mut assigned = vec![false; located.len()];
    let mut clusters = Vec::new();

    for seed_index in 0..located.len() {
        if assigned[seed_index] {
            continue;
        }
        assigned[seed_index] = true;
        let (seed, seed_marker) = located[seed_index];

        let mut members = vec![seed_marker.clone()];
        let mut lat_sum = seed.lat;
        let mut lon_sum = seed.lon;
        let mut center = seed;

        for candidate in (seed_index + 1)..located.len() {
            if assigned[candidate] {
                continue;
            }
            let (position, marker) = located[candidate];
            if seed.degree_distance(&position) <= threshold_degrees {
                assigned[candidate] = true;
                members.push(marker.clone());
                lat_sum += position.lat;
                lon_sum += position.lon;
                let count = members.len() as f64;
                center = Coordinates::new(lat_sum / count, lon_sum / count);
            }
        }

        clusters.push(Cluster {
            center,
            markers: members,
        });
    }

    clusters
}

/// One cluster per located marker, for zoom levels where grouping is off
#[must_use]
pub fn singletons<T: Located + Clone>(markers: &[T]) -> Vec<Cluster<T>> {
    markers
        .iter()
        .filter_map(|m| {
            m.position().map(|center| Cluster {
                center,
                markers: vec![m.clone()],
            })
        })
        .collect()
}
