//! Calendar arithmetic for token expiry and age checks.
//!
//! Both rules here are pinned to existing behavior and must not be
//! "improved": expiry walks one calendar day at a time and counts only
//! weekdays, and age compares `(month, day)` tuples instead of doing
//! day-of-year arithmetic.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc, Weekday};

/// Number of business days a pending verification stays answerable.
pub const EXPIRY_BUSINESS_DAYS: u32 = 3;

/// Monday through Friday. No holiday calendar is consulted.
pub fn is_business_day(weekday: Weekday) -> bool {
    !matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Advance `start` until `days` business days have been counted.
///
/// Each step adds one calendar day; the step only counts when the day it
/// lands on is a weekday. Time of day is preserved.
pub fn add_business_days(start: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let mut cursor = start;
    let mut counted = 0;
    while counted < days {
        cursor += TimeDelta::days(1);
        if is_business_day(cursor.weekday()) {
            counted += 1;
        }
    }
    cursor
}

/// The instant after which a pending record created at `created_at` expires.
pub fn expires_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    add_business_days(created_at, EXPIRY_BUSINESS_DAYS)
}

/// Completed years between `birth` and `today` (exact-anniversary rule).
///
/// Negative when `birth` lies in the future; callers decide what that means.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let before_anniversary = (today.month(), today.day()) < (birth.month(), birth.day());
    today.year() - birth.year() - i32::from(before_anniversary)
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parse an English month name into its number (1-12).
///
/// Accepts the full name or its three-letter abbreviation, any case.
pub fn parse_month(name: &str) -> Option<u32> {
    let needle = name.trim().trim_end_matches('.').to_ascii_lowercase();
    if needle.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| *m == needle || (needle.len() == 3 && m.starts_with(&needle)))
        .map(|i| i as u32 + 1)
}
