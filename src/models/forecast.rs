//! Daily air quality forecast entry

use chrono::NaiveDate;
use serde::Serialize;
use serde::ser::SerializeStruct;

use super::AqiCategory;

/// One forecast day. Like `PollutantReading`, the category is derived from
/// the index on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastDay {
    pub date: NaiveDate,
    /// "Today" for the first entry, weekday name afterwards
    pub day_name: String,
    pub overall_aqi: i32,
    /// Display name of the pollutant driving the index
    pub primary_pollutant: String,
    /// False when the index is a placeholder with no reading behind it
    pub has_data: bool,
}

impl ForecastDay {
    #[must_use]
    pub fn category(&self) -> AqiCategory {
        AqiCategory::from_aqi(self.has_data.then_some(self.overall_aqi))
    }
}

impl Serialize for ForecastDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ForecastDay", 5)?;
        state.serialize_field("date", &self.date)?;
        state.serialize_field("dayName", &self.day_name)?;
        state.serialize_field("overallAQI", &self.overall_aqi)?;
        state.serialize_field("category", self.category().label())?;
        state.serialize_field("primaryPollutant", &self.primary_pollutant)?;
        state.end()
    }
}
