//! Reconstruction of per-interval timestamps for one day of readings.
//!
//! A NEM12 interval row carries only a calendar date and a run of values;
//! the timestamp of each value is implied by its position and the meter's
//! interval length.

use crate::domain::{IntervalMinutes, NewReading};
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("expected {expected} interval values for a {interval}-minute day, found {found}")]
    ShapeMismatch {
        interval: IntervalMinutes,
        expected: usize,
        found: usize,
    },
}

/// Start-of-interval timestamps for `date`, from 00:00 up to but excluding
/// the following midnight.
pub fn interval_timestamps(date: NaiveDate, interval: IntervalMinutes) -> Vec<NaiveDateTime> {
    let start = date.and_time(chrono::NaiveTime::MIN);
    let step = interval.as_duration();
    (0..interval.readings_per_day())
        .map(|i| start + step * i as i32)
        .collect()
}

/// Pair `values` positionally with the day's interval timestamps.
///
/// # Errors
/// Returns `ShapeMismatch` unless there is exactly one value per interval.
pub fn pair_readings(
    date: NaiveDate,
    interval: IntervalMinutes,
    values: &[f64],
) -> Result<Vec<NewReading>, TimelineError> {
    let expected = interval.readings_per_day();
    if values.len() != expected {
        return Err(TimelineError::ShapeMismatch {
            interval,
            expected,
            found: values.len(),
        });
    }

    Ok(interval_timestamps(date, interval)
        .into_iter()
        .zip(values.iter().copied())
        .map(|(timestamp, value)| NewReading { timestamp, value })
        .collect())
}
