//! Retention period grammar used by vacuuming policies.
//!
//! A period is one or more tokens, each a non-negative integer followed by a
//! unit character, optionally separated by a single space:
//!
//! | unit | meaning |
//! |------|---------|
//! | `y`  | years   |
//! | `m`  | months  |
//! | `d`  | days    |
//! | `h`  | hours   |
//! | `M`  | minutes |
//!
//! Units are case-sensitive. `"1y 6m"`, `"30d12h"` and `"15M"` are valid;
//! `"1w"`, `"1 y"` and `""` are not. A unit given twice keeps the last value,
//! so `"2h 3h"` means three hours.

use chrono::{DateTime, Days, Months, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+[ymdhM] ?)+$").expect("duration grammar is a valid regex"));

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)([ymdhM])").expect("duration token is a valid regex"));

/// Errors produced while assigning a retention period.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    /// The string does not match `(\d+[ymdhM] ?)+`.
    #[error("Invalid duration format '{0}': expected tokens like '1y 6m 2d 3h 30M'")]
    InvalidDurationFormat(String),
}

/// A calendar-aware retention period.
///
/// Each component is stored as written; months and years have no fixed
/// length in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RetentionPeriod {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl RetentionPeriod {
    /// Parse a period, failing on anything outside the grammar.
    pub fn parse(input: &str) -> Result<Self, DurationError> {
        if !GRAMMAR.is_match(input) {
            return Err(DurationError::InvalidDurationFormat(input.to_string()));
        }

        let mut period = RetentionPeriod::default();
        for token in TOKEN.captures_iter(input) {
            let value: u32 = token[1]
                .parse()
                .map_err(|_| DurationError::InvalidDurationFormat(input.to_string()))?;

            // Assignment, not accumulation: a repeated unit overwrites.
            match &token[2] {
                "y" => period.years = value,
                "m" => period.months = value,
                "d" => period.days = value,
                "h" => period.hours = value,
                "M" => period.minutes = value,
                _ => return Err(DurationError::InvalidDurationFormat(input.to_string())),
            }
        }

        Ok(period)
    }

    pub fn is_zero(&self) -> bool {
        *self == RetentionPeriod::default()
    }

    /// Add this period to `from`: years, then months, then days, then hours,
    /// then minutes.
    ///
    /// Month arithmetic clamps to the last day of the target month
    /// (Jan 31 + 1m = Feb 28/29). Returns `None` on overflow.
    pub fn add_to(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        from.checked_add_months(Months::new(self.years.checked_mul(12)?))?
            .checked_add_months(Months::new(self.months))?
            .checked_add_days(Days::new(u64::from(self.days)))?
            .checked_add_signed(TimeDelta::try_hours(i64::from(self.hours))?)?
            .checked_add_signed(TimeDelta::try_minutes(i64::from(self.minutes))?)
    }
}

impl FromStr for RetentionPeriod {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RetentionPeriod::parse(s)
    }
}

impl TryFrom<String> for RetentionPeriod {
    type Error = DurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RetentionPeriod::parse(&value)
    }
}

impl From<RetentionPeriod> for String {
    fn from(period: RetentionPeriod) -> Self {
        period.to_string()
    }
}

impl fmt::Display for RetentionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0M");
        }

        let parts = [
            (self.years, 'y'),
            (self.months, 'm'),
            (self.days, 'd'),
            (self.hours, 'h'),
            (self.minutes, 'M'),
        ];

        let rendered: Vec<String> = parts
            .iter()
            .filter(|(value, _)| *value > 0)
            .map(|(value, unit)| format!("{value}{unit}"))
            .collect();

        write!(f, "{}", rendered.join(" "))
    }
}
