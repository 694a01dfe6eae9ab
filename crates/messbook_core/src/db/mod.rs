//! Ledger database bootstrap.
//!
//! One SQLite file holds the whole mess book: expense entries with their
//! items, and one attendance grid per month. Every session (process, tab,
//! device sync worker) opens its own connection through [`open_db`].
//!
//! # Invariants
//! - A connection is handed out only after migrations reach
//!   [`migrations::latest_version`].
//! - A book written by a newer build is refused instead of downgraded.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure to open, migrate or talk to the ledger database.
#[derive(Debug)]
pub enum DbError {
    /// SQLite refused the statement: locked by another session past the busy
    /// timeout, constraint violation, I/O failure or a corrupt file.
    Sqlite(rusqlite::Error),
    /// The book's `user_version` is ahead of this build's migrations.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Another session held the write lock longer than the busy timeout.
    ///
    /// Nothing was written; the caller may retry the whole operation.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            Self::UnsupportedSchemaVersion { .. } => false,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "ledger database error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "ledger file uses schema v{db_version}; this build reads up to v{latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
