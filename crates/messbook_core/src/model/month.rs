//! Calendar month key used to scope attendance grids.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Year + month pair, printed and parsed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthKeyError {
    MonthOutOfRange(u32),
    Malformed(String),
}

impl Display for MonthKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MonthOutOfRange(month) => write!(f, "month must be 1..=12, got {month}"),
            Self::Malformed(value) => write!(f, "month key must be `YYYY-MM`, got `{value}`"),
        }
    }
}

impl Error for MonthKeyError {}

impl MonthKey {
    /// Builds a key; `month` must be in `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self, MonthKeyError> {
        if !(1..=12).contains(&month) {
            return Err(MonthKeyError::MonthOutOfRange(month));
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Month containing the local wall-clock date.
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    /// Calendar year.
    pub fn year(self) -> i32 {
        self.year
    }

    /// Month number, `1..=12`.
    pub fn month(self) -> u32 {
        self.month
    }

    /// Number of calendar days, leap years included.
    pub fn days_in_month(self) -> u32 {
        match self.month {
            4 | 6 | 9 | 11 => 30,
            2 => {
                if NaiveDate::from_ymd_opt(self.year, 2, 29).is_some() {
                    29
                } else {
                    28
                }
            }
            _ => 31,
        }
    }

    /// Whether `date` falls in this month.
    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Human label such as `October 2026`.
    pub fn label(self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(first) => first.format("%B %Y").to_string(),
            None => self.to_string(),
        }
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let malformed = || MonthKeyError::Malformed(trimmed.to_string());
        let (year, month) = trimmed.split_once('-').ok_or_else(malformed)?;
        let year = year.parse::<i32>().map_err(|_| malformed())?;
        let month = month.parse::<u32>().map_err(|_| malformed())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = MonthKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{MonthKey, MonthKeyError};
    use chrono::NaiveDate;

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(MonthKey::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(MonthKey::new(2026, 2).unwrap().days_in_month(), 28);
        assert_eq!(MonthKey::new(1900, 2).unwrap().days_in_month(), 28);
        assert_eq!(MonthKey::new(2026, 9).unwrap().days_in_month(), 30);
        assert_eq!(MonthKey::new(2026, 10).unwrap().days_in_month(), 31);
    }

    #[test]
    fn parses_and_prints_month_keys() {
        let key: MonthKey = "2026-03".parse().expect("valid key");
        assert_eq!(key.to_string(), "2026-03");
        assert_eq!(key.label(), "March 2026");
        assert_eq!(
            "2026-13".parse::<MonthKey>().unwrap_err(),
            MonthKeyError::MonthOutOfRange(13)
        );
        assert!(matches!(
            "march".parse::<MonthKey>(),
            Err(MonthKeyError::Malformed(_))
        ));
    }

    #[test]
    fn contains_matches_year_and_month() {
        let key = MonthKey::new(2026, 10).unwrap();
        assert!(key.contains(NaiveDate::from_ymd_opt(2026, 10, 31).unwrap()));
        assert!(!key.contains(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()));
    }
}
