#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Crime event types shared across the crime grid toolchain.
//!
//! A [`CrimeEvent`] is a projected point with a category label and the
//! temporal buckets (`month`, `hour`, `dow`) the monthly tally is keyed by.
//! Loaders produce events; the aggregator only reads them.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike as _, NaiveDateTime, Timelike as _};
use geo::Point;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Categories tracked with a dedicated per-cell counter when the
/// configuration does not name any.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DefaultCategory {
    /// Unlawful entry to commit a felony or theft
    Burglary,
    /// Taking property by force or threat
    Robbery,
    /// Physical attack or threat of attack
    Assault,
}

impl DefaultCategory {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Burglary, Self::Robbery, Self::Assault]
    }

    /// Returns the default tracked category labels, in column order.
    #[must_use]
    pub fn labels() -> Vec<String> {
        Self::all().iter().map(ToString::to_string).collect()
    }
}

/// Returns the output column name for a tracked category
/// (`"MOTOR VEHICLE THEFT"` becomes `crime_motor_vehicle_theft`).
#[must_use]
pub fn category_column(category: &str) -> String {
    format!("crime_{}", column_slug(category))
}

/// Lowercases `label` and replaces every run of non-alphanumeric characters
/// with a single `_`.
#[must_use]
pub fn column_slug(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut pending_sep = false;

    for ch in label.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    slug
}

/// A calendar month bucket, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u8,
}

impl Month {
    /// Creates a month bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if `month` is not in `1..=12`.
    pub const fn new(year: i32, month: u8) -> Result<Self, InvalidTemporalError> {
        if month >= 1 && month <= 12 {
            Ok(Self { year, month })
        } else {
            Err(InvalidTemporalError::Month { value: month })
        }
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(self) -> u8 {
        self.month
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = InvalidTemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTemporalError::MonthLabel {
            value: s.to_owned(),
        };

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

/// Error returned when a temporal field is out of range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTemporalError {
    /// Month number outside `1..=12`.
    Month { value: u8 },
    /// Hour outside `0..=23`.
    Hour { value: u8 },
    /// Day of week outside `0..=6`.
    DayOfWeek { value: u8 },
    /// A month label that is not `YYYY-MM`.
    MonthLabel { value: String },
}

impl fmt::Display for InvalidTemporalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Month { value } => write!(f, "invalid month {value}: expected 1-12"),
            Self::Hour { value } => write!(f, "invalid hour {value}: expected 0-23"),
            Self::DayOfWeek { value } => {
                write!(f, "invalid day of week {value}: expected 0-6")
            }
            Self::MonthLabel { value } => {
                write!(f, "invalid month label {value:?}: expected YYYY-MM")
            }
        }
    }
}

impl std::error::Error for InvalidTemporalError {}

/// The temporal buckets an event is tallied under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemporalBucket {
    pub month: Month,
    /// Hour of day, `0..=23`.
    pub hour: u8,
    /// Day of week, Monday = 0 through Sunday = 6.
    pub dow: u8,
}

impl TemporalBucket {
    /// Creates a bucket from already-derived fields.
    ///
    /// # Errors
    ///
    /// Returns an error if `hour` or `dow` is out of range.
    pub const fn new(month: Month, hour: u8, dow: u8) -> Result<Self, InvalidTemporalError> {
        if hour > 23 {
            return Err(InvalidTemporalError::Hour { value: hour });
        }
        if dow > 6 {
            return Err(InvalidTemporalError::DayOfWeek { value: dow });
        }
        Ok(Self { month, hour, dow })
    }

    /// Derives the month, hour and Monday-indexed weekday of a timestamp.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self {
            month: Month {
                year: at.year(),
                month: at.month() as u8,
            },
            hour: at.hour() as u8,
            dow: at.weekday().num_days_from_monday() as u8,
        }
    }
}

/// One crime record, already projected into the grid's CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct CrimeEvent {
    pub location: Point<f64>,
    /// Category label exactly as reported (e.g. `"BURGLARY"`).
    pub primary_type: String,
    pub when: TemporalBucket,
}

impl CrimeEvent {
    #[must_use]
    pub fn new(
        location: Point<f64>,
        primary_type: impl Into<String>,
        when: TemporalBucket,
    ) -> Self {
        Self {
            location,
            primary_type: primary_type.into(),
            when,
        }
    }

    /// Builds an event from a raw timestamp, deriving its temporal buckets.
    #[must_use]
    pub fn at(location: Point<f64>, primary_type: impl Into<String>, at: NaiveDateTime) -> Self {
        Self::new(location, primary_type, TemporalBucket::from_datetime(at))
    }
}
