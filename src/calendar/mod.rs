//! Month grid and attendance aggregation.
//!
//! Everything in here is a pure function over plain values: the UI, the
//! `show` command and the tests all call the same code with whatever
//! [`MonthKey`] and [`AttendanceRecord`] they hold.
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const WEEKS:         usize = 6;
pub const DAYS_PER_WEEK: usize = 7;

/// Column headers, Sunday first (column index == weekday index).
pub const WEEKDAY_LABELS: [&str; DAYS_PER_WEEK] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

const SUNDAY: u32 = 0;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, CalendarError>;

// ─── MonthKey ─────────────────────────────────────────────────────────────────

/// A calendar month. Fields are public, so every operation re-validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year:  i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let key = Self { year, month };
        key.first_day()?;
        Ok(key)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    /// The 1st of the month, or `InvalidArgument` if the key is out of range.
    pub fn first_day(&self) -> Result<NaiveDate> {
        if !(1..=12).contains(&self.month) {
            return Err(CalendarError::InvalidArgument(format!(
                "month {} outside 1-12", self.month
            )));
        }
        NaiveDate::from_ymd_opt(self.year, self.month, 1).ok_or_else(|| {
            CalendarError::InvalidArgument(format!("year {} is not representable", self.year))
        })
    }

    pub fn next(self) -> Self {
        if self.month >= 12 { Self { year: self.year.saturating_add(1), month: 1 } }
        else                { Self { year: self.year, month: self.month + 1 } }
    }

    pub fn prev(self) -> Self {
        if self.month <= 1 { Self { year: self.year.saturating_sub(1), month: 12 } }
        else               { Self { year: self.year, month: self.month - 1 } }
    }

    /// `YYYY-MM`, the prefix every date key of this month starts with.
    pub fn prefix(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// `YYYY-MM-DD` for a day of this month.
    pub fn date_key(&self, day: u32) -> String {
        format!("{}-{:02}", self.prefix(), day)
    }

    /// "May 2025"
    pub fn title(&self) -> Result<String> {
        Ok(self.first_day()?.format("%B %Y").to_string())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

impl FromStr for MonthKey {
    type Err = CalendarError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || CalendarError::InvalidArgument(format!("expected YYYY-MM, got {s:?}"));
        let (y, m) = s.trim().rsplit_once('-').ok_or_else(bad)?;
        let year:  i32 = y.parse().map_err(|_| bad())?;
        let month: u32 = m.parse().map_err(|_| bad())?;
        MonthKey::new(year, month)
    }
}

// ─── Attendance ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttendanceStatus {
    Present,
    Absent,
    /// Anything the backend sends that is neither; kept verbatim, never counted.
    Other(String),
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AttendanceStatus::Present  => "present",
            AttendanceStatus::Absent   => "absent",
            AttendanceStatus::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for AttendanceStatus {
    fn from(s: &str) -> Self {
        match s {
            "present" => AttendanceStatus::Present,
            "absent"  => AttendanceStatus::Absent,
            _         => AttendanceStatus::Other(s.to_owned()),
        }
    }
}

impl From<String> for AttendanceStatus {
    fn from(s: String) -> Self { AttendanceStatus::from(s.as_str()) }
}

impl From<AttendanceStatus> for String {
    fn from(s: AttendanceStatus) -> Self { s.as_str().to_owned() }
}

/// `YYYY-MM-DD` → status. Read-only as far as this module is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendanceRecord(BTreeMap<String, AttendanceStatus>);

impl AttendanceRecord {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, date: impl Into<String>, status: impl Into<AttendanceStatus>) {
        self.0.insert(date.into(), status.into());
    }

    pub fn get(&self, date: &str) -> Option<&AttendanceStatus> { self.0.get(date) }

    pub fn status_on(&self, key: MonthKey, day: u32) -> Option<&AttendanceStatus> {
        self.0.get(&key.date_key(day))
    }

    /// Entries whose date is a real `YYYY-MM-DD` day of the month. Keys that
    /// only share the prefix (`2025-02-30`, `2025-05-xx`) are skipped.
    pub fn for_month(&self, key: MonthKey) -> impl Iterator<Item = (&String, &AttendanceStatus)> {
        let prefix = key.prefix();
        self.0.iter()
            .filter(move |(date, _)| date.starts_with(&prefix))
            .filter(move |(date, _)| day_of_month(key, date).is_some())
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<K: Into<String>, S: Into<AttendanceStatus>> FromIterator<(K, S)> for AttendanceRecord {
    fn from_iter<I: IntoIterator<Item = (K, S)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, s)| (k.into(), s.into())).collect())
    }
}

// ─── Matrix ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Day(u32),
}

impl Cell {
    pub fn day(self) -> Option<u32> {
        match self {
            Cell::Day(d) => Some(d),
            Cell::Empty  => None,
        }
    }
}

/// Always 6 weeks × 7 days, Sunday-first, regardless of how many rows the
/// month actually uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarMatrix {
    rows: [[Cell; DAYS_PER_WEEK]; WEEKS],
}

impl CalendarMatrix {
    pub fn rows(&self) -> &[[Cell; DAYS_PER_WEEK]; WEEKS] { &self.rows }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    /// (row, col) of a day, if the month has it.
    pub fn position_of(&self, day: u32) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(r, row)| {
            row.iter().position(|c| *c == Cell::Day(day)).map(|col| (r, col))
        })
    }

    /// Day numbers in row-major order.
    pub fn days(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.iter().flat_map(|r| r.iter()).filter_map(|c| c.day())
    }
}

// ─── Operations ───────────────────────────────────────────────────────────────

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(key: MonthKey) -> Result<u32> {
    key.first_day()?;
    Ok(month_length(key.year, key.month))
}

fn month_length(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2                       => 28,
        4 | 6 | 9 | 11          => 30,
        _                       => 31,
    }
}

/// 0 = Sunday .. 6 = Saturday
fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

/// Day number when `date` is exactly `key.date_key(day)` for a real day.
pub fn day_of_month(key: MonthKey, date: &str) -> Option<u32> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let day    = parsed.day();
    (MonthKey::from_date(parsed) == key && key.date_key(day) == date).then_some(day)
}

pub fn build_matrix(key: MonthKey) -> Result<CalendarMatrix> {
    let first = key.first_day()?;
    let start = weekday_index(first) as usize;
    let total = month_length(key.year, key.month);

    let mut rows = [[Cell::Empty; DAYS_PER_WEEK]; WEEKS];
    let mut day  = 1u32;
    for (i, row) in rows.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            if (i == 0 && j < start) || day > total {
                continue;
            }
            *cell = Cell::Day(day);
            day += 1;
        }
    }
    Ok(CalendarMatrix { rows })
}

pub fn sundays_in_month(key: MonthKey) -> Result<u32> {
    let total = days_in_month(key)?;
    let count = (1..=total)
        .filter_map(|d| NaiveDate::from_ymd_opt(key.year, key.month, d))
        .filter(|date| weekday_index(*date) == SUNDAY)
        .count();
    Ok(count as u32)
}

/// Days of the month that are not Sundays. Holidays are not subtracted.
pub fn compute_working_days(key: MonthKey) -> Result<u32> {
    Ok(days_in_month(key)? - sundays_in_month(key)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MonthSummary {
    pub present_count: u32,
    pub absent_count:  u32,
    pub working_days:  u32,
}

pub fn summarize(key: MonthKey, record: &AttendanceRecord) -> Result<MonthSummary> {
    let working_days = compute_working_days(key)?;
    let mut summary  = MonthSummary { working_days, ..MonthSummary::default() };
    for (_, status) in record.for_month(key) {
        match status {
            AttendanceStatus::Present  => summary.present_count += 1,
            AttendanceStatus::Absent   => summary.absent_count  += 1,
            AttendanceStatus::Other(_) => {}
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn may_2025() -> MonthKey { MonthKey::new(2025, 5).unwrap() }

    fn may_record() -> AttendanceRecord {
        AttendanceRecord::from_iter([
            ("2025-05-01", "present"),
            ("2025-05-02", "absent"),
            ("2025-05-03", "present"),
            ("2025-05-06", "present"),
            ("2025-05-07", "absent"),
            ("2025-05-08", "present"),
            ("2025-04-09", "present"),
            ("2025-04-10", "absent"),
        ])
    }

    #[test]
    fn may_2025_layout() {
        let m = build_matrix(may_2025()).unwrap();
        assert_eq!(m.cell(0, 4), Some(Cell::Day(1)));
        for col in 0..4 {
            assert_eq!(m.cell(0, col), Some(Cell::Empty));
        }
        assert_eq!(m.cell(4, 6), Some(Cell::Day(31)));
        assert!(m.rows()[5].iter().all(|c| *c == Cell::Empty));
        assert_eq!(m.position_of(31), Some((4, 6)));
        assert_eq!(m.position_of(32), None);
    }

    #[test]
    fn month_starting_saturday_uses_sixth_row() {
        // March 2025 starts on a Saturday and has 31 days
        let m = build_matrix(MonthKey::new(2025, 3).unwrap()).unwrap();
        assert_eq!(m.position_of(1), Some((0, 6)));
        assert_eq!(m.position_of(31), Some((5, 1)));
    }

    #[test]
    fn may_2025_summary() {
        let s = summarize(may_2025(), &may_record()).unwrap();
        assert_eq!(s, MonthSummary { present_count: 4, absent_count: 2, working_days: 27 });
        assert_eq!(sundays_in_month(may_2025()).unwrap(), 4);
    }

    #[test]
    fn summary_filters_by_month_prefix() {
        let april = MonthKey::new(2025, 4).unwrap();
        let s     = summarize(april, &may_record()).unwrap();
        assert_eq!(s.present_count, 1);
        assert_eq!(s.absent_count, 1);
    }

    #[test]
    fn unknown_statuses_are_ignored() {
        let rec = AttendanceRecord::from_iter([
            ("2025-05-01", "late"),
            ("2025-05-02", "PRESENT"),
            ("2025-05-03", ""),
            ("2025-05-04", " Absent "),
        ]);
        let s = summarize(may_2025(), &rec).unwrap();
        assert_eq!((s.present_count, s.absent_count), (0, 0));
        assert_eq!(rec.get("2025-05-01"), Some(&AttendanceStatus::Other("late".into())));
        assert_eq!(rec.get("2025-05-02").map(|s| s.as_str()), Some("PRESENT"));
    }

    #[test]
    fn days_past_month_end_are_not_counted() {
        let feb = MonthKey::new(2025, 2).unwrap();
        let rec = AttendanceRecord::from_iter((1..=31).map(|d| (feb.date_key(d), "present")));
        let s   = summarize(feb, &rec).unwrap();
        assert_eq!(s.present_count, 28);
        assert_eq!(rec.for_month(feb).count(), 28);
    }

    #[test]
    fn malformed_date_keys_are_not_counted() {
        let rec = AttendanceRecord::from_iter([
            ("2025-05-xx", "present"),
            ("2025-05", "absent"),
            ("2025-05-1", "present"),
            ("2025-05-01T00:00", "present"),
        ]);
        let s = summarize(may_2025(), &rec).unwrap();
        assert_eq!((s.present_count, s.absent_count), (0, 0));
        assert_eq!(day_of_month(may_2025(), "2025-05-31"), Some(31));
        assert_eq!(day_of_month(may_2025(), "2025-06-01"), None);
    }

    #[test]
    fn empty_record_gives_zero_counts() {
        let s = summarize(may_2025(), &AttendanceRecord::new()).unwrap();
        assert_eq!((s.present_count, s.absent_count, s.working_days), (0, 0, 27));
    }

    #[test]
    fn february_lengths() {
        let feb = |y| days_in_month(MonthKey { year: y, month: 2 }).unwrap();
        assert_eq!(feb(2024), 29);
        assert_eq!(feb(2023), 28);
        assert_eq!(feb(2000), 29);
        assert_eq!(feb(1900), 28);
    }

    #[test]
    fn out_of_range_month_is_invalid() {
        for month in [0, 13] {
            let key = MonthKey { year: 2025, month };
            assert!(matches!(build_matrix(key), Err(CalendarError::InvalidArgument(_))));
            assert!(matches!(compute_working_days(key), Err(CalendarError::InvalidArgument(_))));
            assert!(matches!(
                summarize(key, &may_record()),
                Err(CalendarError::InvalidArgument(_))
            ));
            assert!(MonthKey::new(2025, month).is_err());
        }
    }

    #[test]
    fn unrepresentable_year_is_invalid() {
        let key = MonthKey { year: i32::MAX, month: 1 };
        assert!(matches!(build_matrix(key), Err(CalendarError::InvalidArgument(_))));
    }

    #[test]
    fn navigation_wraps_years() {
        let dec = MonthKey::new(2024, 12).unwrap();
        assert_eq!(dec.next(), MonthKey { year: 2025, month: 1 });
        assert_eq!(dec.next().prev(), dec);
        assert_eq!(MonthKey { year: 2025, month: 1 }.prev(), dec);
    }

    #[test]
    fn parse_and_format() {
        let k: MonthKey = "2025-05".parse().unwrap();
        assert_eq!(k, may_2025());
        assert_eq!(k.to_string(), "2025-05");
        assert_eq!(k.date_key(7), "2025-05-07");
        assert_eq!(k.title().unwrap(), "May 2025");
        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("may".parse::<MonthKey>().is_err());
    }

    #[test]
    fn record_deserializes_from_json() {
        let rec: AttendanceRecord =
            serde_json::from_str(r#"{"2025-05-01":"present","2025-05-02":"holiday"}"#).unwrap();
        assert_eq!(rec.status_on(may_2025(), 1), Some(&AttendanceStatus::Present));
        assert_eq!(rec.status_on(may_2025(), 2).map(|s| s.as_str()), Some("holiday"));
        assert_eq!(rec.status_on(may_2025(), 3), None);
    }

    proptest! {
        #[test]
        fn matrix_covers_each_day_once_in_order(year in 1i32..=9999, month in 1u32..=12) {
            let key  = MonthKey { year, month };
            let m    = build_matrix(key).unwrap();
            prop_assert_eq!(m.rows().len(), WEEKS);
            prop_assert!(m.rows().iter().all(|r| r.len() == DAYS_PER_WEEK));
            let days: Vec<u32> = m.days().collect();
            let want: Vec<u32> = (1..=days_in_month(key).unwrap()).collect();
            prop_assert_eq!(days, want);
        }

        #[test]
        fn first_day_sits_in_its_weekday_column(year in 1i32..=9999, month in 1u32..=12) {
            let key   = MonthKey { year, month };
            let first = key.first_day().unwrap();
            let m     = build_matrix(key).unwrap();
            prop_assert_eq!(m.position_of(1), Some((0, weekday_index(first) as usize)));
        }

        #[test]
        fn working_days_plus_sundays_is_month_length(year in 1i32..=9999, month in 1u32..=12) {
            let key      = MonthKey { year, month };
            let sundays  = build_matrix(key).unwrap().rows().iter()
                .filter(|r| r[0] != Cell::Empty).count() as u32;
            prop_assert_eq!(sundays, sundays_in_month(key).unwrap());
            prop_assert_eq!(compute_working_days(key).unwrap() + sundays, days_in_month(key).unwrap());
        }

        #[test]
        fn summarize_is_idempotent_and_bounded(
            month in 1u32..=12,
            marks in proptest::collection::btree_map(1u32..=31, 0u8..3, 0..31),
        ) {
            let key = MonthKey { year: 2025, month };
            let rec = AttendanceRecord::from_iter(marks.iter().map(|(d, s)| {
                let status = match s { 0 => "present", 1 => "absent", _ => "late" };
                (key.date_key(*d), status)
            }));
            let a = summarize(key, &rec).unwrap();
            let b = summarize(key, &rec).unwrap();
            prop_assert_eq!(a, b);
            prop_assert!(a.present_count + a.absent_count <= days_in_month(key).unwrap());
        }
    }
}
