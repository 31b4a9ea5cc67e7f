//! Calendar periods (`YYYY-MM`), the unit of commission and P&L computation.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;

/// A calendar month.
///
/// Ordering matches the string order of the zero-padded `YYYY-MM` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

/// Half-open date range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, EngineError> {
        if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
            return Err(EngineError::InvalidPeriod(format!("{:04}-{:02}", year, month)));
        }
        Ok(Self { year, month })
    }

    /// Period containing the given date
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Current period in the configured timezone
    pub fn current(offset: FixedOffset) -> Self {
        Self::of(today(offset))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.first_day(),
            end: self.next().first_day(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    pub fn days_in_month(&self) -> u32 {
        (self.next().first_day() - self.first_day()).num_days() as u32
    }

    /// Days counted for run-rate projection: the current day of month when
    /// `today` falls inside this period, otherwise the full month.
    pub fn days_elapsed(&self, today: NaiveDate) -> u32 {
        if self.contains(today) {
            today.day()
        } else {
            self.days_in_month()
        }
    }

    /// The `count` periods ending at (and including) this one, oldest first
    pub fn trailing(&self, count: usize) -> Vec<Period> {
        let mut periods = Vec::with_capacity(count);
        let mut cursor = *self;
        for _ in 0..count {
            periods.push(cursor);
            cursor = cursor.prev();
        }
        periods.reverse();
        periods
    }
}

/// Today's date in the given timezone
pub fn today(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidPeriod(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Period::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Period {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(p("2025-02").to_string(), "2025-02");
        assert!("2025-2".parse::<Period>().is_err());
        assert!("2025-13".parse::<Period>().is_err());
        assert!("abcd-01".parse::<Period>().is_err());
        assert!("202501".parse::<Period>().is_err());
    }

    #[test]
    fn test_order_matches_string_order() {
        let mut periods = vec![p("2025-01"), p("2024-12"), p("2025-10"), p("2025-02")];
        let mut keys: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
        periods.sort();
        keys.sort();
        let sorted: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
        assert_eq!(sorted, keys);
    }

    #[test]
    fn test_prev_next_wrap_year() {
        assert_eq!(p("2025-01").prev(), p("2024-12"));
        assert_eq!(p("2024-12").next(), p("2025-01"));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(p("2025-02").days_in_month(), 28);
        assert_eq!(p("2024-02").days_in_month(), 29);
        assert_eq!(p("2025-04").days_in_month(), 30);
        assert_eq!(p("2025-12").days_in_month(), 31);
    }

    #[test]
    fn test_days_elapsed() {
        let feb = p("2025-02");
        let mid = NaiveDate::from_ymd_opt(2025, 2, 14).unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        assert_eq!(feb.days_elapsed(mid), 14);
        assert_eq!(feb.days_elapsed(later), 28);
    }

    #[test]
    fn test_range_is_half_open() {
        let range = p("2025-02").range();
        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()));
    }

    #[test]
    fn test_trailing_oldest_first() {
        let window = p("2025-02").trailing(3);
        assert_eq!(window, vec![p("2024-12"), p("2025-01"), p("2025-02")]);
        assert!(p("2025-02").trailing(0).is_empty());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&p("2025-03")).unwrap();
        assert_eq!(json, "\"2025-03\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p("2025-03"));
    }
}
