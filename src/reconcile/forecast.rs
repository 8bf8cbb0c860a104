//! Five-day forecast resolution
//!
//! The regulatory network's daily forecast is preferred. When it has no
//! usable entry the gridded model's hourly series is bucketed per calendar
//! day instead. Either way day 0 is today and carries the summary's overall
//! index.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::hour_key::model_date;
use crate::aqi::{clamp_aqi, compute_aqi};
use crate::models::feeds::value_at;
use crate::models::{ForecastDay, GriddedSeries, Pollutant, StationForecast};

pub const MAX_FORECAST_DAYS: usize = 5;
const UNKNOWN_POLLUTANT: &str = "N/A";

/// Values day 0 must agree with
#[derive(Debug, Clone, Copy)]
pub struct ForecastAnchor {
    pub today: NaiveDate,
    pub overall_aqi: i32,
    pub primary: Option<Pollutant>,
}

/// Daily entries from the regulatory feed, or `None` when it has nothing
/// for today or later
#[must_use]
pub fn from_station(
    entries: &[StationForecast],
    anchor: &ForecastAnchor,
    max_days: usize,
) -> Option<Vec<ForecastDay>> {
    let mut by_date: BTreeMap<NaiveDate, (i32, String)> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.date >= anchor.today) {
        let Some(aqi) = entry.aqi else { continue };
        let name = Pollutant::from_provider_name(&entry.pollutant_name)
            .map_or_else(|| entry.pollutant_name.trim().to_string(), |p| p.display_name().to_string());
        by_date
            .entry(entry.date)
            .and_modify(|current| {
                if aqi > current.0 {
                    *current = (aqi, name.clone());
                }
            })
            .or_insert((aqi, name));
    }

    if by_date.is_empty() {
        return None;
    }

    let days = by_date
        .into_iter()
        .map(|(date, (aqi, name))| (date, clamp_aqi(f64::from(aqi)), name))
        .collect();
    Some(finish(days, anchor, max_days))
}

/// Daily entries bucketed from the gridded model's hourly series, or `None`
/// when no day from today on has a usable value
#[must_use]
pub fn from_gridded(
    series: &GriddedSeries,
    anchor: &ForecastAnchor,
    max_days: usize,
) -> Option<Vec<ForecastDay>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (index, stamp) in series.time.iter().enumerate() {
        if let Some(date) = model_date(stamp).filter(|d| *d >= anchor.today) {
            buckets.entry(date).or_default().push(index);
        }
    }

    let days: Vec<_> = buckets
        .into_iter()
        .filter_map(|(date, hours)| {
            estimate_day(series, &hours).map(|(aqi, name)| (date, aqi, name))
        })
        .collect();
    if days.is_empty() {
        return None;
    }
    Some(finish(days, anchor, max_days))
}

fn estimate_day(series: &GriddedSeries, hours: &[usize]) -> Option<(i32, String)> {
    let candidates: Vec<(Pollutant, i32)> = Pollutant::ALL
        .iter()
        .filter_map(|p| {
            mean(series.pollutant_aqi(*p), hours)
                .map(clamp_aqi_rounded)
                .or_else(|| compute_aqi(*p, mean(series.concentration(*p), hours)))
                .map(|aqi| (*p, aqi))
        })
        .collect();

    let primary = candidates
        .iter()
        .copied()
        .fold(None, |best: Option<(Pollutant, i32)>, (p, aqi)| match best {
            Some((_, best_aqi)) if best_aqi >= aqi => best,
            _ => Some((p, aqi)),
        });

    let overall = mean(&series.us_aqi, hours)
        .map(clamp_aqi_rounded)
        .or_else(|| primary.map(|(_, aqi)| aqi))?;

    let name = primary.map_or(UNKNOWN_POLLUTANT, |(p, _)| p.display_name());
    Some((overall, name.to_string()))
}

fn clamp_aqi_rounded(value: f64) -> i32 {
    clamp_aqi(value.round())
}

fn mean(series: &[Option<f64>], hours: &[usize]) -> Option<f64> {
    let values: Vec<f64> = hours.iter().filter_map(|i| value_at(series, *i)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Anchor day 0 to today, cap the length and label the days. Day 0 only
/// counts as data when the summary resolved an index.
fn finish(
    mut days: Vec<(NaiveDate, i32, String)>,
    anchor: &ForecastAnchor,
    max_days: usize,
) -> Vec<ForecastDay> {
    let anchor_name = anchor
        .primary
        .map(|p| p.display_name().to_string());

    match days.first_mut() {
        Some(first) if first.0 == anchor.today => {
            first.1 = anchor.overall_aqi;
            if let Some(name) = &anchor_name {
                first.2 = name.clone();
            }
        }
        _ => days.insert(
            0,
            (
                anchor.today,
                anchor.overall_aqi,
                anchor_name.unwrap_or_else(|| UNKNOWN_POLLUTANT.to_string()),
            ),
        ),
    }

    days.truncate(max_days.min(MAX_FORECAST_DAYS));

    days.into_iter()
        .enumerate()
        .map(|(position, (date, overall_aqi, primary_pollutant))| ForecastDay {
            date,
            day_name: day_label(position, date),
            overall_aqi,
            primary_pollutant,
            has_data: position > 0 || anchor.primary.is_some(),
        })
        .collect()
}

fn day_label(position: usize, date: NaiveDate) -> String {
    if position == 0 {
        "Today".to_string()
    } else {
        date.format("%A").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn anchor(overall_aqi: i32) -> ForecastAnchor {
        ForecastAnchor {
            today: date(1),
            overall_aqi,
            primary: Some(Pollutant::Pm25),
        }
    }

    fn station(day: u32, name: &str, aqi: i32) -> StationForecast {
        StationForecast {
            date: date(day),
            pollutant_name: name.to_string(),
            aqi: Some(aqi),
        }
    }

    #[test]
    fn test_station_forecast_groups_per_day() {
        let entries = vec![
            station(1, "O3", 40),
            station(1, "PM2.5", 55),
            station(2, "O3", 70),
            station(2, "PM2.5", 45),
            station(3, "PM10", 20),
        ];
        let days = from_station(&entries, &anchor(61), 5).unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].day_name, "Today");
        assert_eq!(days[0].overall_aqi, 61);
        assert_eq!(days[1].overall_aqi, 70);
        assert_eq!(days[1].primary_pollutant, "O3");
        assert_eq!(days[1].day_name, "Thursday");
        assert_eq!(days[2].primary_pollutant, "PM10");
    }

    #[test]
    fn test_station_forecast_truncates_and_pads_today() {
        let entries: Vec<_> = (2..=9).map(|d| station(d, "O3", 30)).collect();
        let days = from_station(&entries, &anchor(12), 5).unwrap();
        assert_eq!(days.len(), 5);
        assert_eq!(days[0].date, date(1));
        assert_eq!(days[0].overall_aqi, 12);
        assert_eq!(days[4].date, date(5));
        assert!(days.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_station_forecast_ignores_unusable_entries() {
        let entries = vec![
            station(1, "O3", 30),
            StationForecast {
                date: date(2),
                pollutant_name: "PM2.5".to_string(),
                aqi: None,
            },
        ];
        let stale = vec![StationForecast {
            date: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
            pollutant_name: "O3".to_string(),
            aqi: Some(30),
        }];
        assert_eq!(from_station(&entries, &anchor(30), 5).unwrap().len(), 1);
        assert!(from_station(&stale, &anchor(30), 5).is_none());
        assert!(from_station(&[], &anchor(30), 5).is_none());
    }

    #[test]
    fn test_gridded_forecast_averages_hourly_aqi() {
        let series = GriddedSeries {
            time: vec![
                "2024-05-01T22:00".to_string(),
                "2024-05-01T23:00".to_string(),
                "2024-05-02T00:00".to_string(),
                "2024-05-02T01:00".to_string(),
            ],
            us_aqi: vec![Some(40.0), Some(50.0), Some(60.0), Some(81.0)],
            us_aqi_pm2_5: vec![Some(40.0), Some(50.0), Some(60.0), Some(81.0)],
            ..Default::default()
        };
        let days = from_gridded(&series, &anchor(44), 5).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].overall_aqi, 44);
        assert_eq!(days[1].overall_aqi, 71);
        assert_eq!(days[1].primary_pollutant, "PM2.5");
    }

    #[test]
    fn test_gridded_forecast_derives_from_concentrations() {
        let series = GriddedSeries {
            time: vec!["2024-05-02T10:00".to_string(), "2024-05-02T11:00".to_string()],
            pm2_5: vec![Some(14.0), Some(16.0)],
            pm10: vec![Some(40.0), None],
            ..Default::default()
        };
        let days = from_gridded(&series, &anchor(0), 5).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(1));
        assert_eq!(days[1].overall_aqi, 57);
        assert_eq!(days[1].primary_pollutant, "PM2.5");
    }

    #[test]
    fn test_gridded_forecast_without_values() {
        assert!(from_gridded(&GriddedSeries::default(), &anchor(20), 5).is_none());

        let nulls = GriddedSeries {
            time: vec!["2024-05-01T13:00".to_string(), "2024-05-02T13:00".to_string()],
            us_aqi: vec![None, None],
            pm2_5: vec![None, None],
            ..Default::default()
        };
        assert!(from_gridded(&nulls, &anchor(20), 5).is_none());
    }

    #[test]
    fn test_today_without_summary_index_is_no_data() {
        let unresolved = ForecastAnchor {
            today: date(1),
            overall_aqi: 0,
            primary: None,
        };
        let entries = vec![station(1, "O3", 40), station(2, "O3", 70)];
        let days = from_station(&entries, &unresolved, 5).unwrap();

        assert_eq!(days[0].overall_aqi, 0);
        assert!(!days[0].has_data);
        assert_eq!(days[0].category().label(), "No Data");
        assert!(days[1].has_data);
        assert_eq!(days[1].category().label(), "Moderate");
    }
}
