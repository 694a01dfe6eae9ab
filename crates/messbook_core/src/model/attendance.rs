//! Attendance (meal) grid model.
//!
//! # Responsibility
//! - Represent one month of per-day, per-member meal presence.
//! - Provide the all-present initial grid and in-memory toggling.
//!
//! # Invariants
//! - `days` holds exactly one record per day `1..=days_in_month`, in order.
//! - A member missing from a day's `status` counts as absent.

use crate::model::member::{MemberId, Roster};
use crate::model::month::MonthKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Meal presence for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub day: u32,
    pub status: BTreeMap<MemberId, bool>,
}

impl DayRecord {
    /// Missing cells count as absent.
    pub fn is_present(&self, member_id: MemberId) -> bool {
        self.status.get(&member_id).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    DayOutOfRange { day: u32, days_in_month: u32 },
    UnknownMember(MemberId),
}

impl Display for GridError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DayOutOfRange { day, days_in_month } => {
                write!(f, "day {day} is outside 1..={days_in_month}")
            }
            Self::UnknownMember(id) => write!(f, "member {id} is not on the roster"),
        }
    }
}

impl Error for GridError {}

/// One month of attendance records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceGrid {
    pub month: MonthKey,
    pub days: Vec<DayRecord>,
}

impl AttendanceGrid {
    /// Initial grid: every rostered member present on every day.
    pub fn all_present(month: MonthKey, roster: &Roster) -> Self {
        let days = (1..=month.days_in_month())
            .map(|day| DayRecord {
                day,
                status: roster.ids().map(|id| (id, true)).collect(),
            })
            .collect();
        Self { month, days }
    }

    /// Number of day records.
    pub fn days_in_month(&self) -> u32 {
        self.month.days_in_month()
    }

    /// Record for a 1-based `day`.
    pub fn day(&self, day: u32) -> Option<&DayRecord> {
        self.check_day(day).ok()?;
        self.days.iter().find(|record| record.day == day)
    }

    pub fn is_present(&self, day: u32, member_id: MemberId) -> bool {
        self.day(day)
            .map(|record| record.is_present(member_id))
            .unwrap_or(false)
    }

    /// Flips one cell and returns the new presence value.
    ///
    /// A member without a recorded cell is treated as absent, so the first
    /// toggle marks them present.
    pub fn toggle(&mut self, day: u32, member_id: MemberId) -> Result<bool, GridError> {
        self.check_day(day)?;
        let record = self
            .days
            .iter_mut()
            .find(|record| record.day == day)
            .ok_or(GridError::DayOutOfRange {
                day,
                days_in_month: self.month.days_in_month(),
            })?;
        let cell = record.status.entry(member_id).or_insert(false);
        *cell = !*cell;
        Ok(*cell)
    }

    /// Number of days on which `member_id` is marked present.
    pub fn meals_for(&self, member_id: MemberId) -> u32 {
        self.days
            .iter()
            .filter(|record| record.is_present(member_id))
            .count() as u32
    }

    fn check_day(&self, day: u32) -> Result<(), GridError> {
        let days_in_month = self.month.days_in_month();
        if day == 0 || day > days_in_month {
            return Err(GridError::DayOutOfRange { day, days_in_month });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AttendanceGrid, GridError};
    use crate::model::member::{Member, Roster};
    use crate::model::month::MonthKey;

    fn roster() -> Roster {
        Roster::new(vec![Member::new(1, "A", 1, 15), Member::new(2, "B", 16, 30)])
            .expect("valid roster")
    }

    #[test]
    fn all_present_grid_covers_every_day_and_member() {
        let month = MonthKey::new(2026, 9).unwrap();
        let grid = AttendanceGrid::all_present(month, &roster());
        assert_eq!(grid.days.len(), 30);
        assert_eq!(grid.days[0].day, 1);
        assert_eq!(grid.days[29].day, 30);
        assert_eq!(grid.meals_for(1), 30);
        assert_eq!(grid.meals_for(2), 30);
    }

    #[test]
    fn double_toggle_restores_original_grid() {
        let month = MonthKey::new(2026, 9).unwrap();
        let original = AttendanceGrid::all_present(month, &roster());
        let mut grid = original.clone();

        assert!(!grid.toggle(7, 2).expect("toggle off"));
        assert!(!grid.is_present(7, 2));
        assert!(grid.is_present(7, 1));
        assert_eq!(grid.meals_for(2), 29);

        assert!(grid.toggle(7, 2).expect("toggle on"));
        assert_eq!(grid, original);
    }

    #[test]
    fn toggle_rejects_out_of_range_day() {
        let month = MonthKey::new(2026, 2).unwrap();
        let mut grid = AttendanceGrid::all_present(month, &roster());
        assert_eq!(
            grid.toggle(29, 1).unwrap_err(),
            GridError::DayOutOfRange {
                day: 29,
                days_in_month: 28
            }
        );
        assert!(grid.toggle(0, 1).is_err());
    }
}
