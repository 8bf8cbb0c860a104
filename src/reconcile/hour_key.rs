//! Hour matching against the gridded model's time axis

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const HOUR_KEY_FORMAT: &str = "%Y-%m-%dT%H:00";
const MODEL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Calendar-hour key of an instant in the reference zone, in the model's
/// timestamp format ("2024-05-01T13:00")
#[must_use]
pub fn to_hour_key(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format(HOUR_KEY_FORMAT).to_string()
}

/// Index of the exact key, else the last index; `None` only for an empty
/// axis
#[must_use]
pub fn find_index_or_last(times: &[String], key: &str) -> Option<usize> {
    times
        .iter()
        .position(|t| t == key)
        .or_else(|| times.len().checked_sub(1))
}

/// Parse a model timestamp expressed in the reference zone
#[must_use]
pub fn parse_model_time(stamp: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(stamp, MODEL_TIME_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Calendar date part of a model timestamp
#[must_use]
pub fn model_date(stamp: &str) -> Option<NaiveDate> {
    stamp
        .get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
}

/// Today's date in the reference zone
#[must_use]
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}
