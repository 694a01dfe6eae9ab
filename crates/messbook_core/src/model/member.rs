//! Member and roster model.
//!
//! # Responsibility
//! - Describe the fixed roster of members and their shift ranges.
//! - Validate roster shape once at configuration load.
//!
//! # Invariants
//! - Member ids are unique within a roster.
//! - Every shift satisfies `1 <= shift_start <= shift_end <= 31`.
//! - Shift ranges are expected to partition the month, but gaps and overlaps
//!   are reported rather than rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable member identifier assigned by configuration.
pub type MemberId = u32;

const MAX_DAY_OF_MONTH: u32 = 31;

/// One roster member with an assigned shift range (inclusive days).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub shift_start: u32,
    pub shift_end: u32,
}

impl Member {
    /// Unvalidated member; [`Roster::new`] checks the shift range.
    pub fn new(id: MemberId, name: impl Into<String>, shift_start: u32, shift_end: u32) -> Self {
        Self {
            id,
            name: name.into(),
            shift_start,
            shift_end,
        }
    }

    /// Returns whether `day` falls inside this member's shift range.
    pub fn covers(&self, day: u32) -> bool {
        (self.shift_start..=self.shift_end).contains(&day)
    }
}

/// Roster validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    Empty,
    DuplicateMemberId(MemberId),
    EmptyName(MemberId),
    InvalidShift {
        member_id: MemberId,
        shift_start: u32,
        shift_end: u32,
    },
}

impl Display for RosterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "roster must contain at least one member"),
            Self::DuplicateMemberId(id) => write!(f, "duplicate member id in roster: {id}"),
            Self::EmptyName(id) => write!(f, "member {id} has an empty name"),
            Self::InvalidShift {
                member_id,
                shift_start,
                shift_end,
            } => write!(
                f,
                "member {member_id} has invalid shift range {shift_start}..={shift_end}"
            ),
        }
    }
}

impl Error for RosterError {}

/// Ordered, validated list of members.
///
/// Order is configuration order and is preserved in settlement reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Member>", into = "Vec<Member>")]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    /// Builds a roster after validating ids, names and shift bounds.
    pub fn new(members: Vec<Member>) -> Result<Self, RosterError> {
        if members.is_empty() {
            return Err(RosterError::Empty);
        }

        let mut seen = BTreeSet::new();
        for member in &members {
            if !seen.insert(member.id) {
                return Err(RosterError::DuplicateMemberId(member.id));
            }
            if member.name.trim().is_empty() {
                return Err(RosterError::EmptyName(member.id));
            }
            if member.shift_start == 0
                || member.shift_start > member.shift_end
                || member.shift_end > MAX_DAY_OF_MONTH
            {
                return Err(RosterError::InvalidShift {
                    member_id: member.id,
                    shift_start: member.shift_start,
                    shift_end: member.shift_end,
                });
            }
        }

        Ok(Self { members })
    }

    /// Members in configuration order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Number of rostered members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false` for a validated roster.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member with `id`, if rostered.
    pub fn get(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }

    /// Whether `id` is on the roster.
    pub fn contains(&self, id: MemberId) -> bool {
        self.get(id).is_some()
    }

    /// Display name for a member id, if rostered.
    pub fn name_of(&self, id: MemberId) -> Option<&str> {
        self.get(id).map(|member| member.name.as_str())
    }

    /// Member ids in roster order.
    pub fn ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.members.iter().map(|member| member.id)
    }

    /// Days in `1..=days_in_month` not covered by any shift.
    pub fn coverage_gaps(&self, days_in_month: u32) -> Vec<u32> {
        (1..=days_in_month)
            .filter(|day| !self.members.iter().any(|member| member.covers(*day)))
            .collect()
    }

    /// Days in `1..=days_in_month` covered by more than one shift.
    pub fn overlapping_days(&self, days_in_month: u32) -> Vec<u32> {
        (1..=days_in_month)
            .filter(|day| {
                self.members
                    .iter()
                    .filter(|member| member.covers(*day))
                    .count()
                    > 1
            })
            .collect()
    }
}

impl TryFrom<Vec<Member>> for Roster {
    type Error = RosterError;

    fn try_from(value: Vec<Member>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Roster> for Vec<Member> {
    fn from(value: Roster) -> Self {
        value.members
    }
}

#[cfg(test)]
mod tests {
    use super::{Member, Roster, RosterError};

    fn two_member_roster() -> Roster {
        Roster::new(vec![
            Member::new(1, "Rahim", 1, 15),
            Member::new(2, "Karim", 16, 30),
        ])
        .expect("valid roster")
    }

    #[test]
    fn rejects_duplicate_ids_and_bad_shifts() {
        let err = Roster::new(vec![Member::new(1, "A", 1, 5), Member::new(1, "B", 6, 9)])
            .expect_err("duplicate id must fail");
        assert_eq!(err, RosterError::DuplicateMemberId(1));

        let err = Roster::new(vec![Member::new(3, "C", 10, 4)]).expect_err("inverted shift");
        assert!(matches!(err, RosterError::InvalidShift { member_id: 3, .. }));

        let err = Roster::new(vec![Member::new(4, "D", 0, 4)]).expect_err("day zero");
        assert!(matches!(err, RosterError::InvalidShift { member_id: 4, .. }));

        assert_eq!(Roster::new(Vec::new()).unwrap_err(), RosterError::Empty);
        assert_eq!(
            Roster::new(vec![Member::new(5, "  ", 1, 2)]).unwrap_err(),
            RosterError::EmptyName(5)
        );
    }

    #[test]
    fn reports_gaps_and_overlaps_without_rejecting() {
        let roster = Roster::new(vec![
            Member::new(1, "A", 1, 10),
            Member::new(2, "B", 9, 20),
        ])
        .expect("overlap is not a load error");

        assert_eq!(roster.overlapping_days(30), vec![9, 10]);
        assert_eq!(roster.coverage_gaps(23), vec![21, 22, 23]);
    }

    #[test]
    fn full_partition_has_no_gaps() {
        let roster = two_member_roster();
        assert!(roster.coverage_gaps(30).is_empty());
        assert!(roster.overlapping_days(30).is_empty());
        assert_eq!(roster.coverage_gaps(31), vec![31]);
    }

    #[test]
    fn deserializes_with_validation() {
        let json = r#"[{"id":1,"name":"A","shift_start":1,"shift_end":15}]"#;
        let roster: Roster = serde_json::from_str(json).expect("valid json roster");
        assert_eq!(roster.name_of(1), Some("A"));

        let bad = r#"[{"id":1,"name":"A","shift_start":9,"shift_end":2}]"#;
        assert!(serde_json::from_str::<Roster>(bad).is_err());
    }
}
