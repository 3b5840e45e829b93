//! Post-name rules evaluated at creation time.
//!
//! A post name doubles as its URL path segment in the embedding host, so a
//! handful of path words are reserved and a `YYYY/MM` shape collides with
//! period listings.

use time::{Date, Month, OffsetDateTime, Time, util::days_in_month};

use super::warnings::Warning;

/// Path words the host routes before falling through to post lookup.
pub const RESERVED_NAMES: [&str; 7] = [
    "create", "view", "edit", "delete", "archive", "category", "author",
];

/// Checks a candidate post name against the reserved words and the
/// period-listing ambiguity. Pure; returns one warning per problem found.
pub fn check_post_name(name: &str) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let lowered = name.to_lowercase();
    for reserved in RESERVED_NAMES {
        if lowered == reserved {
            warnings.push(Warning::general(format!(
                "'{lowered}' is a reserved name. Please change."
            )));
        }
        if lowered.starts_with(&format!("{reserved}/")) {
            warnings.push(Warning::general(format!(
                "Name cannot start with a reserved name as first item in path ('{reserved}'). Please change."
            )));
        }
    }
    let segments: Vec<&str> = lowered.split('/').collect();
    if segments.len() == 2 && parse_period(&segments).is_some() {
        warnings.push(Warning::general(format!(
            "'{lowered}' is seen as a time period, and cannot be used as a name. Please change."
        )));
    }
    warnings
}

/// Interprets two path segments as a `YYYY/MM` month and returns the month
/// as a UTC `[from, to)` interval, or `None` when the segments are not a
/// real month.
pub fn parse_period(segments: &[&str]) -> Option<(OffsetDateTime, OffsetDateTime)> {
    if segments.len() != 2 {
        return None;
    }
    let year: i32 = segments[0].parse().ok()?;
    let month: u8 = segments[1].parse().ok()?;
    let month = Month::try_from(month).ok()?;
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let from = OffsetDateTime::new_utc(first, Time::MIDNIGHT);
    let to = OffsetDateTime::new_utc(add_months(first, 1), Time::MIDNIGHT);
    Some((from, to))
}

/// Shifts a date by whole months, clamping the day to the target month's
/// length.
pub fn add_months(date: Date, months: i32) -> Date {
    let zero_based = date.month() as i32 - 1 + months;
    let year = date.year() + zero_based.div_euclid(12);
    let month = Month::try_from((zero_based.rem_euclid(12) + 1) as u8)
        .expect("month index is within 1..=12");
    let day = date.day().min(days_in_month(month, year));
    Date::from_calendar_date(year, month, day).expect("clamped day fits the month")
}
