//! Temporal types for billing cycles and organisation-local periods
//!
//! Billing runs think in calendar windows: "this client's invoice for the
//! current month", "this expense definition's entry for the current year".
//! The types here compute those windows, clamp configured days-of-month to
//! real dates, and convert date windows into timestamp periods at an
//! organisation's local day boundaries.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

/// Timezone wrapper for organisation locales
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Converts a UTC datetime to the local timezone
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<Tz> {
        utc.with_timezone(&self.0)
    }

    /// Returns the local calendar date of a UTC instant
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }

    /// Gets the start of day (00:00:00) in this timezone as UTC
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_opt(0, 0, 0)
            .unwrap()
            .and_local_timezone(self.0)
            .single()
            .expect("Invalid timezone conversion")
            .with_timezone(&Utc)
    }

    /// Gets the end of day (23:59:59.999999999) in this timezone as UTC
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_nano_opt(23, 59, 59, 999_999_999)
            .unwrap()
            .and_local_timezone(self.0)
            .single()
            .expect("Invalid timezone conversion")
            .with_timezone(&Utc)
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: start {start} must be before end {end}")]
    InvalidPeriod { start: String, end: String },

    #[error("Invalid day of month: {0}")]
    InvalidDayOfMonth(u32),

    #[error("Invalid calendar date: {year}-{month}")]
    InvalidDate { year: i32, month: u32 },
}

/// An inclusive range of calendar dates
///
/// This is the unit of idempotency checks: "does an entry already exist in
/// this window?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TemporalError> {
        if start > end {
            return Err(TemporalError::InvalidPeriod {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// The calendar month containing the given date
    pub fn month_of(date: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
            .expect("first of month is always valid");
        let end = last_day_of_month(date.year(), date.month());
        Self { start, end }
    }

    /// The calendar year containing the given date
    pub fn year_of(date: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(date.year(), 1, 1)
            .expect("january 1st is always valid");
        let end = NaiveDate::from_ymd_opt(date.year(), 12, 31)
            .expect("december 31st is always valid");
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Converts to a timestamp period at the given timezone's day boundaries
    pub fn to_period(&self, tz: &Timezone) -> Period {
        Period {
            start: tz.start_of_day(self.start),
            end: tz.end_of_day(self.end),
        }
    }
}

/// A bounded period of time in UTC
///
/// Reconciliation reads ledger entries and payments whose dates fall in a
/// period; the period's edges come from a `DateRange` in the org's locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Start of the period (inclusive)
    pub start: DateTime<Utc>,
    /// End of the period (inclusive)
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TemporalError> {
        if start >= end {
            return Err(TemporalError::InvalidPeriod {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// The cadence of a recurring charge or expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

impl BillingCycle {
    /// The calendar window of this cycle containing the given date
    ///
    /// Monthly cycles map to the calendar month, annual cycles to the
    /// calendar year. Two runs inside the same window are the same cycle
    /// for idempotency purposes.
    pub fn window_containing(&self, date: NaiveDate) -> DateRange {
        match self {
            BillingCycle::Monthly => DateRange::month_of(date),
            BillingCycle::Annual => DateRange::year_of(date),
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingCycle::Monthly => write!(f, "monthly"),
            BillingCycle::Annual => write!(f, "annual"),
        }
    }
}

/// Returns the last day of the given calendar month
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("predecessor of first of month is always valid")
}

/// Resolves a configured day-of-month within a real calendar month
///
/// Day 31 in April resolves to April 30; day 29 in a non-leap February
/// resolves to February 28. Days outside 1..=31 are rejected.
pub fn clamped_day_of_month(
    year: i32,
    month: u32,
    day: u32,
) -> Result<NaiveDate, TemporalError> {
    if day == 0 || day > 31 {
        return Err(TemporalError::InvalidDayOfMonth(day));
    }
    let last = last_day_of_month(year, month);
    let clamped = day.min(last.day());
    NaiveDate::from_ymd_opt(year, month, clamped)
        .ok_or(TemporalError::InvalidDate { year, month })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_month_window() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 14).unwrap();
        let window = DateRange::month_of(date);

        assert_eq!(window.start, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert!(window.contains(date));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()));
    }

    #[test]
    fn test_annual_window() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let window = BillingCycle::Annual.window_containing(date);

        assert_eq!(window.start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn test_clamped_day_of_month() {
        let d = clamped_day_of_month(2025, 4, 31).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 4, 30).unwrap());

        let d = clamped_day_of_month(2025, 2, 29).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());

        let d = clamped_day_of_month(2024, 2, 29).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        assert!(clamped_day_of_month(2025, 1, 0).is_err());
        assert!(clamped_day_of_month(2025, 1, 32).is_err());
    }

    #[test]
    fn test_period_from_range() {
        let tz = Timezone::default();
        let window = DateRange::month_of(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        let period = window.to_period(&tz);

        assert!(period.contains(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert!(period.contains(Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap()));
        assert!(!period.contains(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_period_rejects_inverted_bounds() {
        let start = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(Period::new(start, end).is_err());
    }
}
