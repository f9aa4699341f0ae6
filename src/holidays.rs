//! School holidays as published by the backend.
//!
//! Holidays are listed per month next to the attendance grid. They are
//! informational only: `compute_working_days` never subtracts them.
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::MonthKey;

// ─── Data types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    /// `YYYY-MM-DD`
    pub date:  String,
    pub title: String,
}

impl Holiday {
    pub fn new(date: impl Into<String>, title: impl Into<String>) -> Self {
        Self { date: date.into(), title: title.into() }
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }

    pub fn day(&self) -> Option<u32> {
        self.parsed_date().map(|d| d.day())
    }

    /// "Mon, May 5", falling back to the raw date when it doesn't parse.
    pub fn label(&self) -> String {
        match self.parsed_date() {
            Some(d) => d.format("%a, %b %-d").to_string(),
            None    => self.date.clone(),
        }
    }
}

// ─── Public API ───────────────────────────────────────────────────────────────

/// Holidays of one month, ordered by date then title.
pub fn holidays_in_month(all: &[Holiday], key: MonthKey) -> Vec<&Holiday> {
    let prefix = key.prefix();
    let mut out: Vec<&Holiday> = all.iter().filter(|h| h.date.starts_with(&prefix)).collect();
    out.sort_by(|a, b| a.date.cmp(&b.date).then(a.title.cmp(&b.title)));
    out
}

/// Day numbers of the month that carry at least one holiday.
pub fn holiday_days(all: &[Holiday], key: MonthKey) -> Vec<u32> {
    let mut days: Vec<u32> = holidays_in_month(all, key).iter().filter_map(|h| h.day()).collect();
    days.dedup();
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Holiday> {
        vec![
            Holiday::new("2025-05-20", "Founders Day"),
            Holiday::new("2025-04-21", "Mahavir Jayanti"),
            Holiday::new("2025-05-05", "Labour Day"),
            Holiday::new("2025-04-14", "Dr. Ambedkar Jayanti"),
        ]
    }

    #[test]
    fn filters_and_orders_by_month() {
        let all = sample();
        let may = holidays_in_month(&all, MonthKey::new(2025, 5).unwrap());
        let titles: Vec<&str> = may.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, ["Labour Day", "Founders Day"]);
        assert!(holidays_in_month(&all, MonthKey::new(2025, 6).unwrap()).is_empty());
    }

    #[test]
    fn label_formats_like_the_calendar_card() {
        assert_eq!(Holiday::new("2025-05-05", "Labour Day").label(), "Mon, May 5");
        assert_eq!(Holiday::new("soon", "TBD").label(), "soon");
    }

    #[test]
    fn holiday_days_are_unique() {
        let mut all = sample();
        all.push(Holiday::new("2025-05-05", "Staff Training"));
        assert_eq!(holiday_days(&all, MonthKey::new(2025, 5).unwrap()), [5, 20]);
    }
}
