//! Calendar-day storage keys for the daily counter.
//!
//! Keys look like `shorts_2026_9_19`. The month component is zero-based
//! (January is `0`) so keys written by the browser extension stay readable.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Prefix separating counter keys from settings keys.
pub const DAY_KEY_PREFIX: &str = "shorts_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayKey {
    year: i32,
    /// Zero-based month.
    month0: u32,
    day: u32,
}

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month0: date.month0(),
            day: date.day(),
        }
    }

    /// Key for the local calendar day containing `at`.
    pub fn for_instant<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        Self::from_date(at.with_timezone(&Local).date_naive())
    }

    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month0(&self) -> u32 {
        self.month0
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// Calendar date this key names.
    ///
    /// Always succeeds for keys built from a date; keys parsed from storage
    /// are validated in [`FromStr`], so this only returns `None` for keys
    /// constructed by hand.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month0.saturating_add(1), self.day)
    }

    pub fn is_day_key(key: &str) -> bool {
        key.starts_with(DAY_KEY_PREFIX)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{DAY_KEY_PREFIX}{}_{}_{}",
            self.year, self.month0, self.day
        )
    }
}

impl FromStr for DayKey {
    type Err = ParseError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let rest = key
            .strip_prefix(DAY_KEY_PREFIX)
            .ok_or_else(|| ParseError::NotDayKey(key.to_string()))?;

        let parts: Vec<&str> = rest.split('_').collect();
        let [year, month0, day] = parts.as_slice() else {
            return Err(ParseError::MalformedDayKey(key.to_string()));
        };

        let malformed = |_| ParseError::MalformedDayKey(key.to_string());
        let year: i32 = year.parse().map_err(malformed)?;
        let month0: u32 = month0.parse().map_err(malformed)?;
        let day: u32 = day.parse().map_err(malformed)?;

        let date = NaiveDate::from_ymd_opt(year, month0.saturating_add(1), day)
            .ok_or_else(|| ParseError::InvalidDate(key.to_string()))?;
        Ok(Self::from_date(date))
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self::from_date(date)
    }
}
