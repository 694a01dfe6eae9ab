//! Engine-level error kinds returned by every public operation.
//!
//! # Invariants
//! - Each failed operation maps to exactly one of `Validation`, `Permission`,
//!   `NotFound` or `Persistence`.
//! - A failed operation leaves storage and published state untouched.

use crate::model::attendance::GridError;
use crate::model::expense::{ActorId, EntryId, ExpenseValidationError};
use crate::model::member::MemberId;
use crate::model::month::MonthKey;
use crate::repo::RepoError;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

/// Why an actor was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDenied {
    /// Only the creator may edit or delete an entry.
    NotOwner { entry_id: EntryId, actor: ActorId },
    /// The identity resolver has no member for this actor.
    UnknownActor(ActorId),
    /// Strict shift policy: attributed member is off shift on that date.
    OffShift { member_id: MemberId, date: NaiveDate },
}

impl Display for PermissionDenied {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOwner { entry_id, actor } => {
                write!(f, "actor `{actor}` does not own entry {entry_id}")
            }
            Self::UnknownActor(actor) => write!(f, "actor `{actor}` is not mapped to a member"),
            Self::OffShift { member_id, date } => {
                write!(f, "member {member_id} is not on shift on {date}")
            }
        }
    }
}

/// What could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Entry(EntryId),
    Member(MemberId),
    Grid(MonthKey),
    Day { day: u32, days_in_month: u32 },
}

impl Display for NotFound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry(id) => write!(f, "expense entry not found: {id}"),
            Self::Member(id) => write!(f, "member not found: {id}"),
            Self::Grid(month) => write!(f, "attendance grid not found for {month}"),
            Self::Day { day, days_in_month } => {
                write!(f, "day {day} is outside 1..={days_in_month}")
            }
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    /// Malformed input: missing date, no valid items.
    Validation(ExpenseValidationError),
    Permission(PermissionDenied),
    NotFound(NotFound),
    /// Storage rejected or failed the write/read. Not retried.
    Persistence(RepoError),
}

impl EngineError {
    /// Stable machine-readable kind, used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Permission(_) => "permission_error",
            Self::NotFound(_) => "not_found",
            Self::Persistence(_) => "persistence_error",
        }
    }

    /// True when storage was only busy; retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(RepoError::Db(err)) if err.is_busy())
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::Permission(reason) => write!(f, "permission denied: {reason}"),
            Self::NotFound(target) => write!(f, "{target}"),
            Self::Persistence(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::Permission(_) | Self::NotFound(_) => None,
        }
    }
}

impl From<ExpenseValidationError> for EngineError {
    fn from(value: ExpenseValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<PermissionDenied> for EngineError {
    fn from(value: PermissionDenied) -> Self {
        Self::Permission(value)
    }
}

impl From<GridError> for EngineError {
    fn from(value: GridError) -> Self {
        match value {
            GridError::DayOutOfRange { day, days_in_month } => {
                Self::NotFound(NotFound::Day { day, days_in_month })
            }
            GridError::UnknownMember(id) => Self::NotFound(NotFound::Member(id)),
        }
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::EntryNotFound(id) => Self::NotFound(NotFound::Entry(id)),
            RepoError::GridNotFound(month) => Self::NotFound(NotFound::Grid(month)),
            RepoError::DayOutOfRange { day, days_in_month } => {
                Self::NotFound(NotFound::Day { day, days_in_month })
            }
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Persistence(other),
        }
    }
}
