//! Article identity and the normalization rules shared by every view.
//!
//! An article is identified by its URL string, exactly as the feed delivered
//! it. Two fetches of the same URL are the same article even if the title or
//! description changed in between.
//!
//! Text search folds case on both sides and matches substrings of the title.
//! Date filtering works on whole UTC calendar days.
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Wire format for calendar days (`from` query parameter, CLI `--date`).
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Returns the identity key for an article URL.
///
/// The URL is used verbatim; no trimming, lowercasing or query stripping
/// happens, so the key always equals the stored `id` column.
pub fn identity_key(url: &str) -> &str {
    url
}

/// Case-insensitive substring match of `query` against `title`.
///
/// An empty query matches every title.
pub fn title_matches(title: &str, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    title.to_lowercase().contains(&query.to_lowercase())
}

// ============================================================================
// Calendar Day
// ============================================================================

#[derive(Debug, Error)]
#[error("Invalid date '{input}': expected YYYY-MM-DD")]
pub struct DayParseError {
    input: String,
}

/// A single UTC calendar day selected as a date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Build a day from year/month/day, `None` for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The UTC day containing `instant`.
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self(instant.date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Half-open bounds `[start of day, start of next day)` in UTC.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.0.and_time(NaiveTime::MIN).and_utc();
        let end = self
            .0
            .checked_add_days(Days::new(1))
            .map(|next| next.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (start, end)
    }

    /// Whether `instant` falls within this day (start inclusive, end exclusive).
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let (start, end) = self.bounds();
        instant >= start && instant < end
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl FromStr for CalendarDay {
    type Err = DayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
            .map(Self)
            .map_err(|_| DayParseError {
                input: s.to_string(),
            })
    }
}

impl TryFrom<String> for CalendarDay {
    type Error = DayParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CalendarDay> for String {
    fn from(day: CalendarDay) -> Self {
        day.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_identity_is_url_verbatim() {
        assert_eq!(
            identity_key("https://example.com/a?x=1"),
            "https://example.com/a?x=1"
        );
        assert_ne!(
            identity_key("https://example.com/a"),
            identity_key("https://example.com/a/")
        );
    }

    #[test]
    fn test_title_matches_case_insensitive() {
        assert!(title_matches("Rust 2024 Edition Released", "rust"));
        assert!(title_matches("Rust 2024 Edition Released", "EDITION"));
        assert!(!title_matches("Rust 2024 Edition Released", "python"));
    }

    #[test]
    fn test_title_matches_empty_query() {
        assert!(title_matches("anything", ""));
        assert!(title_matches("", ""));
    }

    #[test]
    fn test_title_matches_unicode() {
        assert!(title_matches("Über die Brücke", "über"));
        assert!(title_matches("ÇAKIR yazdı", "çakir"));
        // Case folding is locale-independent: dotless ı is its own letter
        assert!(!title_matches("ÇAKIR yazdı", "çakır"));
    }

    #[test]
    fn test_day_boundaries() {
        let day = CalendarDay::from_ymd(2024, 2, 15).unwrap();

        assert!(!day.contains(at(2024, 2, 14, 23, 59, 59)));
        assert!(day.contains(at(2024, 2, 15, 0, 0, 0)));
        assert!(day.contains(at(2024, 2, 15, 23, 59, 59)));
        assert!(!day.contains(at(2024, 2, 16, 0, 0, 0)));
    }

    #[test]
    fn test_day_bounds_cross_month() {
        let day = CalendarDay::from_ymd(2024, 2, 29).unwrap();
        let (start, end) = day.bounds();
        assert_eq!(start, at(2024, 2, 29, 0, 0, 0));
        assert_eq!(end, at(2024, 3, 1, 0, 0, 0));
    }

    #[test]
    fn test_day_parse_and_display() {
        let day: CalendarDay = "2025-01-22".parse().unwrap();
        assert_eq!(day, CalendarDay::from_ymd(2025, 1, 22).unwrap());
        assert_eq!(day.to_string(), "2025-01-22");
    }

    #[test]
    fn test_day_parse_rejects_garbage() {
        assert!("22/01/2025".parse::<CalendarDay>().is_err());
        assert!("2025-02-30".parse::<CalendarDay>().is_err());
        let err = "soon".parse::<CalendarDay>().unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_day_of_instant() {
        assert_eq!(
            CalendarDay::of(at(2024, 3, 1, 23, 0, 0)),
            CalendarDay::from_ymd(2024, 3, 1).unwrap()
        );
    }
}
