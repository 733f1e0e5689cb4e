//! Working-day predicate and calendar-aware day arithmetic.
//!
//! Ported from the working-day logic of the underlying scheduling engine
//! (`DateUtils`), generalized from JSON/string dates to a typed `Calendar`
//! over `chrono::NaiveDate`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// A calendar exception for a single date.
///
/// The legacy string form (`"Thanksgiving"`) is accepted on load and always
/// means a non-working day; see §6's "Calendar exception legacy format".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalendarException {
    Detailed {
        working: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Legacy(String),
}

impl CalendarException {
    fn is_working(&self) -> bool {
        match self {
            Self::Detailed { working, .. } => *working,
            Self::Legacy(_) => false,
        }
    }
}

/// Working-time calendar: a weekday set plus per-date exceptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    /// 0 = Sunday .. 6 = Saturday, matching the wire format in §3/§6.
    pub working_days: BTreeSet<u8>,
    pub exceptions: BTreeMap<NaiveDate, CalendarException>,
}

impl Default for Calendar {
    /// Monday through Friday, no exceptions.
    fn default() -> Self {
        Self {
            working_days: [1, 2, 3, 4, 5].into_iter().collect(),
            exceptions: BTreeMap::new(),
        }
    }
}

fn weekday_index(date: NaiveDate) -> u8 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// First consults exceptions, then falls back to the weekday set.
pub fn is_work_day(calendar: &Calendar, date: NaiveDate) -> bool {
    if let Some(exception) = calendar.exceptions.get(&date) {
        return exception.is_working();
    }
    calendar.working_days.contains(&weekday_index(date))
}

/// Step `date` by `n` working days.
///
/// `n = 0` advances to the next working day (idempotent if `date` is already
/// working). Otherwise steps one calendar day at a time in the sign
/// direction, decrementing the remaining count only on working days, then
/// keeps stepping until landing on a working day. `is_work_day(result)`
/// always holds.
pub fn add_work_days(calendar: &Calendar, date: NaiveDate, n: i32) -> NaiveDate {
    let mut current = date;

    if n == 0 {
        while !is_work_day(calendar, current) {
            current = current.succ_opt().unwrap_or(current);
        }
        return current;
    }

    let direction: i64 = if n >= 0 { 1 } else { -1 };
    let mut remaining = n.unsigned_abs();

    while remaining > 0 {
        current = step(current, direction);
        if is_work_day(calendar, current) {
            remaining -= 1;
        }
    }

    while !is_work_day(calendar, current) {
        current = step(current, direction);
    }

    current
}

fn step(date: NaiveDate, direction: i64) -> NaiveDate {
    if direction > 0 {
        date.succ_opt().unwrap_or(date)
    } else {
        date.pred_opt().unwrap_or(date)
    }
}

/// Inclusive count of working days in `[min(a,b), max(a,b)]`, minimum 1.
pub fn calc_work_days(calendar: &Calendar, a: NaiveDate, b: NaiveDate) -> u32 {
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    let mut count = 0u32;
    let mut current = start;
    while current <= end {
        if is_work_day(calendar, current) {
            count += 1;
        }
        current = match current.succ_opt() {
            Some(d) => d,
            None => break,
        };
    }
    count.max(1)
}

/// Signed working-day step count from `a` to `b`, exclusive of `a`.
pub fn calc_work_days_difference(calendar: &Calendar, a: NaiveDate, b: NaiveDate) -> i32 {
    if a == b {
        return 0;
    }

    let mut current = a;
    let mut count: i32 = 0;

    if b > a {
        while current < b {
            current = match current.succ_opt() {
                Some(d) => d,
                None => break,
            };
            if is_work_day(calendar, current) {
                count += 1;
            }
        }
    } else {
        while current > b {
            if is_work_day(calendar, current) {
                count -= 1;
            }
            current = match current.pred_opt() {
                Some(d) => d,
                None => break,
            };
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn default_calendar_is_mon_fri() {
        let cal = Calendar::default();
        assert!(is_work_day(&cal, date(2025, 1, 6))); // Monday
        assert!(!is_work_day(&cal, date(2025, 1, 4))); // Saturday
        assert!(!is_work_day(&cal, date(2025, 1, 5))); // Sunday
    }

    #[test]
    fn exception_overrides_weekday() {
        let mut cal = Calendar::default();
        cal.exceptions.insert(
            date(2025, 1, 6),
            CalendarException::Detailed { working: false, description: None },
        );
        cal.exceptions.insert(
            date(2025, 1, 4),
            CalendarException::Detailed { working: true, description: None },
        );
        assert!(!is_work_day(&cal, date(2025, 1, 6)));
        assert!(is_work_day(&cal, date(2025, 1, 4)));
    }

    #[test]
    fn legacy_string_exception_is_non_working() {
        let mut cal = Calendar::default();
        cal.exceptions.insert(date(2025, 1, 6), CalendarException::Legacy("Holiday".into()));
        assert!(!is_work_day(&cal, date(2025, 1, 6)));
    }

    #[test]
    fn add_work_days_zero_advances_to_next_working_day() {
        let cal = Calendar::default();
        assert_eq!(add_work_days(&cal, date(2025, 1, 6), 0), date(2025, 1, 6));
        assert_eq!(add_work_days(&cal, date(2025, 1, 4), 0), date(2025, 1, 6));
    }

    #[test]
    fn add_work_days_skips_weekend() {
        let cal = Calendar::default();
        // Friday + 1 -> Monday
        assert_eq!(add_work_days(&cal, date(2025, 1, 3), 1), date(2025, 1, 6));
    }

    #[test]
    fn add_work_days_negative_skips_weekend() {
        let cal = Calendar::default();
        assert_eq!(add_work_days(&cal, date(2025, 1, 6), -1), date(2025, 1, 3));
    }

    #[test]
    fn add_work_days_across_full_exception_week() {
        let mut cal = Calendar::default();
        for d in 6..=10 {
            cal.exceptions.insert(
                date(2025, 1, d),
                CalendarException::Detailed { working: false, description: None },
            );
        }
        // Friday 2025-01-03 + 1 working day must jump past the excepted week.
        assert_eq!(add_work_days(&cal, date(2025, 1, 3), 1), date(2025, 1, 13));
    }

    #[test]
    fn calc_work_days_minimum_one() {
        let cal = Calendar::default();
        assert_eq!(calc_work_days(&cal, date(2025, 1, 6), date(2025, 1, 6)), 1);
    }

    #[test]
    fn calc_work_days_weekend_spanning() {
        let cal = Calendar::default();
        assert_eq!(calc_work_days(&cal, date(2025, 1, 3), date(2025, 1, 9)), 5);
    }

    #[test]
    fn calc_work_days_difference_signed() {
        let cal = Calendar::default();
        assert_eq!(calc_work_days_difference(&cal, date(2025, 1, 6), date(2025, 1, 6)), 0);
        assert!(calc_work_days_difference(&cal, date(2025, 1, 6), date(2025, 1, 9)) > 0);
        assert!(calc_work_days_difference(&cal, date(2025, 1, 9), date(2025, 1, 6)) < 0);
    }

    #[test]
    fn add_then_subtract_round_trips_on_working_day() {
        let cal = Calendar::default();
        let start = date(2025, 1, 6);
        let forward = add_work_days(&cal, start, 7);
        assert_eq!(add_work_days(&cal, forward, -7), start);
    }
}
