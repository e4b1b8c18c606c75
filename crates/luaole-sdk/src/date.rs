//! Automation date conversion.
//!
//! An automation date is an `f64` counting days since 1899-12-30 midnight.
//! The integral part is the day offset and the *absolute* value of the
//! fractional part is the time of day, so `-1.25` is 1899-12-29 06:00.
//! Representable dates run from 0100-01-01 to 9999-12-31.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

const SECONDS_PER_DAY: f64 = 86_400.0;

// 0100-01-01 and 10000-01-01 as day offsets from the epoch
const FIRST_DAY: f64 = -657_434.0;
const PAST_LAST_DAY: f64 = 2_958_466.0;

/// Calendar fields of a date, as handed to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFields {
    /// Year (100..=9999)
    pub year: i32,
    /// Month (1..=12)
    pub month: u32,
    /// Day of month (1..=31)
    pub day: u32,
    /// Hour (0..=23)
    pub hour: u32,
    /// Minute (0..=59)
    pub min: u32,
    /// Second (0..=59)
    pub sec: u32,
}

fn epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

impl DateFields {
    /// Decompose an automation date, rounding to whole seconds.
    ///
    /// Returns `None` for non-finite values and dates outside the
    /// representable range.
    pub fn from_ole(value: f64) -> Option<Self> {
        if !value.is_finite() || value <= FIRST_DAY - 1.0 || value >= PAST_LAST_DAY {
            return None;
        }
        let days = value.trunc();
        let seconds = ((value - days).abs() * SECONDS_PER_DAY).round() as i64;
        let dt = epoch()?
            .checked_add_signed(Duration::days(days as i64))?
            .checked_add_signed(Duration::seconds(seconds))?;
        Some(Self::from_datetime(&dt))
    }

    /// Encode as an automation date.
    ///
    /// Returns `None` when the fields do not name a valid calendar instant.
    pub fn to_ole(&self) -> Option<f64> {
        let dt = self.to_datetime()?;
        let base = epoch()?;
        let days = (dt.date() - base.date()).num_days() as f64;
        let fraction = dt.time().num_seconds_from_midnight() as f64 / SECONDS_PER_DAY;
        let value = if days >= 0.0 {
            days + fraction
        } else {
            days - fraction
        };
        if value <= FIRST_DAY - 1.0 || value >= PAST_LAST_DAY {
            return None;
        }
        Some(value)
    }

    /// Fields of a chrono date-time (sub-second precision is dropped)
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        DateFields {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            min: dt.minute(),
            sec: dt.second(),
        }
    }

    /// Build a chrono date-time from the fields
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?
            .and_hms_opt(self.hour, self.min, self.sec)
    }
}
