//! Storage contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access traits for ledger and grids.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every mutating call is one SQLite transaction (one atomic write).
//! - Read paths reject structurally invalid rows instead of masking them.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::expense::{EntryId, ExpenseValidationError};
use crate::model::month::MonthKey;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod attendance_repo;
pub mod expense_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by ledger and attendance storage.
#[derive(Debug)]
pub enum RepoError {
    Validation(ExpenseValidationError),
    Db(DbError),
    EntryNotFound(EntryId),
    GridNotFound(MonthKey),
    DayOutOfRange { day: u32, days_in_month: u32 },
    /// Connection was not bootstrapped through `open_db*`.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::EntryNotFound(id) => write!(f, "expense entry not found: {id}"),
            Self::GridNotFound(month) => write!(f, "attendance grid not found for {month}"),
            Self::DayOutOfRange { day, days_in_month } => {
                write!(f, "day {day} is outside 1..={days_in_month}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ExpenseValidationError> for RepoError {
    fn from(value: ExpenseValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}
