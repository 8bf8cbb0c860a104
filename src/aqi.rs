//! AQI calculator
//!
//! Maps a pollutant concentration onto the 0-500 US EPA index by piecewise
//! linear interpolation over published breakpoint tables. Pollutants without
//! a table yield `None`; so does a missing concentration.

use crate::models::Pollutant;

/// Lowest and highest index the scale can express
pub const AQI_MIN: i32 = 0;
pub const AQI_MAX: i32 = 500;

/// One tier of a breakpoint table: concentration range mapped onto an index
/// range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub c_low: f64,
    pub c_high: f64,
    pub i_low: i32,
    pub i_high: i32,
}

impl Breakpoint {
    const fn new(c_low: f64, c_high: f64, i_low: i32, i_high: i32) -> Self {
        Self {
            c_low,
            c_high,
            i_low,
            i_high,
        }
    }

    fn interpolate(&self, concentration: f64) -> f64 {
        let slope = f64::from(self.i_high - self.i_low) / (self.c_high - self.c_low);
        slope * (concentration - self.c_low) + f64::from(self.i_low)
    }
}

/// PM2.5 in µg/m³ (24-hour)
pub const PM25_BREAKPOINTS: [Breakpoint; 7] = [
    Breakpoint::new(0.0, 12.0, 0, 50),
    Breakpoint::new(12.1, 35.4, 51, 100),
    Breakpoint::new(35.5, 55.4, 101, 150),
    Breakpoint::new(55.5, 150.4, 151, 200),
    Breakpoint::new(150.5, 250.4, 201, 300),
    Breakpoint::new(250.5, 350.4, 301, 400),
    Breakpoint::new(350.5, 500.4, 401, 500),
];

/// PM10 in µg/m³ (24-hour)
pub const PM10_BREAKPOINTS: [Breakpoint; 7] = [
    Breakpoint::new(0.0, 54.0, 0, 50),
    Breakpoint::new(55.0, 154.0, 51, 100),
    Breakpoint::new(155.0, 254.0, 101, 150),
    Breakpoint::new(255.0, 354.0, 151, 200),
    Breakpoint::new(355.0, 424.0, 201, 300),
    Breakpoint::new(425.0, 504.0, 301, 400),
    Breakpoint::new(505.0, 604.0, 401, 500),
];

/// Breakpoint table for a pollutant, if one is known
#[must_use]
pub fn breakpoints(pollutant: Pollutant) -> Option<&'static [Breakpoint]> {
    match pollutant {
        Pollutant::Pm25 => Some(&PM25_BREAKPOINTS),
        Pollutant::Pm10 => Some(&PM10_BREAKPOINTS),
        Pollutant::O3 => None,
    }
}

/// Compute the AQI for a concentration in the pollutant's native unit.
///
/// Values that fall between two tiers use the upper tier. Values beyond the
/// ends of the table continue the slope of the outermost tier and the result
/// is clamped to `[AQI_MIN, AQI_MAX]`.
#[must_use]
pub fn compute_aqi(pollutant: Pollutant, concentration: Option<f64>) -> Option<i32> {
    let concentration = concentration.filter(|c| c.is_finite())?;
    let table = breakpoints(pollutant)?;
    let tier = select_tier(table, concentration)?;
    Some(clamp_aqi(tier.interpolate(concentration).round()))
}

fn select_tier(table: &[Breakpoint], concentration: f64) -> Option<&Breakpoint> {
    table
        .iter()
        .find(|tier| concentration <= tier.c_high)
        .or_else(|| table.last())
}

/// Round a raw index value into the valid range
#[must_use]
pub fn clamp_aqi(value: f64) -> i32 {
    if value.is_nan() {
        return AQI_MIN;
    }
    // the clamp keeps the cast lossless
    value.clamp(f64::from(AQI_MIN), f64::from(AQI_MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Pollutant::Pm25, 0.0, 0)]
    #[case(Pollutant::Pm25, 12.0, 50)]
    #[case(Pollutant::Pm25, 15.0, 57)]
    #[case(Pollutant::Pm25, 35.4, 100)]
    #[case(Pollutant::Pm25, 55.4, 150)]
    #[case(Pollutant::Pm25, 150.4, 200)]
    #[case(Pollutant::Pm25, 250.4, 300)]
    #[case(Pollutant::Pm25, 500.4, 500)]
    #[case(Pollutant::Pm10, 40.0, 37)]
    #[case(Pollutant::Pm10, 54.0, 50)]
    #[case(Pollutant::Pm10, 154.0, 100)]
    #[case(Pollutant::Pm10, 604.0, 500)]
    fn test_known_breakpoints(
        #[case] pollutant: Pollutant,
        #[case] concentration: f64,
        #[case] expected: i32,
    ) {
        assert_eq!(compute_aqi(pollutant, Some(concentration)), Some(expected));
    }

    #[rstest]
    #[case(Pollutant::Pm25)]
    #[case(Pollutant::Pm10)]
    #[case(Pollutant::O3)]
    fn test_missing_concentration_is_none(#[case] pollutant: Pollutant) {
        assert_eq!(compute_aqi(pollutant, None), None);
        assert_eq!(compute_aqi(pollutant, Some(f64::NAN)), None);
    }

    #[test]
    fn test_pollutant_without_table() {
        assert_eq!(compute_aqi(Pollutant::O3, Some(0.05)), None);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(compute_aqi(Pollutant::Pm25, Some(900.0)), Some(500));
        assert_eq!(compute_aqi(Pollutant::Pm10, Some(5000.0)), Some(500));
        assert_eq!(compute_aqi(Pollutant::Pm25, Some(-4.0)), Some(0));
    }

    #[test]
    fn test_between_tiers_uses_upper_tier() {
        assert_eq!(compute_aqi(Pollutant::Pm25, Some(12.05)), Some(51));
        assert_eq!(compute_aqi(Pollutant::Pm10, Some(54.5)), Some(51));
    }

    #[test]
    fn test_monotonic_within_tiers() {
        for pollutant in [Pollutant::Pm25, Pollutant::Pm10] {
            for tier in breakpoints(pollutant).unwrap() {
                let mut previous = i32::MIN;
                let steps = 50;
                for step in 0..=steps {
                    let c = tier.c_low + (tier.c_high - tier.c_low) * f64::from(step) / f64::from(steps);
                    let aqi = compute_aqi(pollutant, Some(c)).unwrap();
                    assert!(aqi >= previous, "{pollutant} not monotonic at {c}");
                    previous = aqi;
                }
            }
        }
    }

    #[test]
    fn test_continuous_at_tier_boundaries() {
        for pollutant in [Pollutant::Pm25, Pollutant::Pm10] {
            let table = breakpoints(pollutant).unwrap();
            for pair in table.windows(2) {
                let top = compute_aqi(pollutant, Some(pair[0].c_high)).unwrap();
                let bottom = compute_aqi(pollutant, Some(pair[1].c_low)).unwrap();
                assert!(bottom - top <= 1, "{pollutant} jumps {top} -> {bottom}");
                assert!(bottom >= top);
            }
        }
    }

    #[test]
    fn test_results_stay_in_range() {
        for c in [0.0, 1.0, 99.0, 420.0, 10_000.0] {
            let aqi = compute_aqi(Pollutant::Pm25, Some(c)).unwrap();
            assert!((AQI_MIN..=AQI_MAX).contains(&aqi));
        }
    }
}
