//! Calendar-day helpers.
//!
//! Every date that becomes a map key or a range bound is a [`NaiveDate`]:
//! a local calendar day with no time-of-day and no offset. Instants are
//! converted exactly once, through [`to_local_midnight`].

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{PricingError, Result};

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Normalize an instant to the local calendar day it falls on.
pub fn to_local_midnight<Tz: TimeZone>(instant: &DateTime<Tz>) -> NaiveDate {
    instant.with_timezone(&Local).date_naive()
}

/// Calendar days from `start` to `end`, including `end` only when `inclusive`.
///
/// Stay ranges use `inclusive = false`: the checkout day is not occupied.
/// Returns an empty vec when `start` is after `end`.
pub fn get_date_range(start: NaiveDate, end: NaiveDate, inclusive: bool) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|day| if inclusive { *day <= end } else { *day < end })
        .collect()
}

/// Stable `YYYY-MM-DD` key built from calendar fields.
pub fn format_date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_KEY_FORMAT).map_err(|_| {
        PricingError::validation(format!("invalid date '{value}', expected YYYY-MM-DD"))
    })
}

/// Inclusive window of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(PricingError::validation(format!(
                "start date {} must not be after end date {}",
                format_date_key(start),
                format_date_key(end)
            )));
        }
        Ok(Self { start, end })
    }

    /// Smallest window covering both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn len_days(&self) -> u32 {
        u32::try_from((self.end - self.start).num_days() + 1).unwrap_or(u32::MAX)
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        get_date_range(self.start, self.end, true)
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}..{}",
            format_date_key(self.start),
            format_date_key(self.end)
        )
    }
}
