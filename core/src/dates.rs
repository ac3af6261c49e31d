//! Relative and literal date tokens to ISO `YYYY-MM-DD`.
//!
//! Relative tokens resolve against the wall clock at parse time, so the same
//! text can produce different dates across calls.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::extract::fold_full_width;

static FULL_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:\D|$)").expect("valid full date regex")
});
static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{1,2})/(\d{1,2})(?:\D|$)").expect("valid month/day regex")
});

const TODAY: [&str; 2] = ["today", "今日"];
const TOMORROW: [&str; 2] = ["tomorrow", "明日"];
const YESTERDAY: [&str; 2] = ["yesterday", "昨日"];
const NEXT_WEEK: [&str; 2] = ["next week", "来週"];
const NEXT_MONTH: [&str; 2] = ["next month", "来月"];

/// Source of "now" for relative date tokens.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in a fixed time zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// A clock frozen at one instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Resolve a date token to an ISO date string, or `None` if it is not a date.
pub fn normalize(token: &str, now: NaiveDateTime) -> Option<String> {
    resolve(token, now).map(|date| date.format("%Y-%m-%d").to_string())
}

/// Ordered checks, first hit wins.
pub fn resolve(token: &str, now: NaiveDateTime) -> Option<NaiveDate> {
    let lower = fold_full_width(token.trim()).to_lowercase();
    if lower.is_empty() {
        return None;
    }
    let today = now.date();

    if contains_any(&lower, &TODAY) {
        return Some(today);
    }
    if contains_any(&lower, &TOMORROW) {
        return today.checked_add_days(Days::new(1));
    }
    if contains_any(&lower, &YESTERDAY) {
        return today.checked_sub_days(Days::new(1));
    }
    if contains_any(&lower, &NEXT_WEEK) {
        return today.checked_add_days(Days::new(7));
    }
    if contains_any(&lower, &NEXT_MONTH) {
        let (year, month) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    if let Some(caps) = FULL_DATE_RE.captures(&lower) {
        let year = caps.get(1)?.as_str().parse().ok()?;
        let month = caps.get(2)?.as_str().parse().ok()?;
        let day = caps.get(3)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if let Some(caps) = MONTH_DAY_RE.captures(&lower) {
        // No rollover: a past M/D stays in the current year.
        let month = caps.get(1)?.as_str().parse().ok()?;
        let day = caps.get(2)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(today.year(), month, day);
    }
    None
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("valid test date")
    }

    #[test]
    fn relative_tokens_in_both_languages() {
        let now = at(2026, 1, 10);
        assert_eq!(normalize("today", now).as_deref(), Some("2026-01-10"));
        assert_eq!(normalize("今日", now).as_deref(), Some("2026-01-10"));
        assert_eq!(normalize("Tomorrow", now).as_deref(), Some("2026-01-11"));
        assert_eq!(normalize("明日", now).as_deref(), Some("2026-01-11"));
        assert_eq!(normalize("昨日", now).as_deref(), Some("2026-01-09"));
        assert_eq!(normalize("next week", now).as_deref(), Some("2026-01-17"));
        assert_eq!(normalize("来週", now).as_deref(), Some("2026-01-17"));
    }

    #[test]
    fn next_month_is_first_of_following_month() {
        assert_eq!(normalize("来月", at(2026, 1, 31)).as_deref(), Some("2026-02-01"));
        assert_eq!(normalize("next month", at(2026, 12, 5)).as_deref(), Some("2027-01-01"));
    }

    #[test]
    fn full_dates_are_zero_padded() {
        let now = at(2026, 1, 10);
        assert_eq!(normalize("2026-3-1", now).as_deref(), Some("2026-03-01"));
        assert_eq!(normalize("2026/03/01", now).as_deref(), Some("2026-03-01"));
        assert_eq!(normalize("due 2027/12/24", now).as_deref(), Some("2027-12-24"));
    }

    #[test]
    fn month_day_uses_current_year_without_rollover() {
        assert_eq!(normalize("3/1", at(2026, 1, 10)).as_deref(), Some("2026-03-01"));
        // Already past in 2026, still resolved into 2026.
        assert_eq!(normalize("1/5", at(2026, 11, 20)).as_deref(), Some("2026-01-05"));
    }

    #[test]
    fn full_width_digits_are_read() {
        let now = at(2026, 1, 10);
        assert_eq!(normalize("３/１", now).as_deref(), Some("2026-03-01"));
        assert_eq!(normalize("２０２６／１２／２４", now).as_deref(), Some("2026-12-24"));
    }

    #[test]
    fn invalid_and_unknown_tokens_are_none() {
        let now = at(2026, 1, 10);
        assert_eq!(normalize("2/30", now), None);
        assert_eq!(normalize("2025/2/29", now), None);
        assert_eq!(normalize("someday", now), None);
        assert_eq!(normalize("", now), None);
    }

    #[test]
    fn fixed_clock_returns_its_instant() {
        let clock = FixedClock(at(2026, 5, 1));
        assert_eq!(clock.now(), at(2026, 5, 1));
    }
}
