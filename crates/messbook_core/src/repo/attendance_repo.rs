//! Attendance grid repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist one attendance grid per month as a header row plus cells.
//! - Offer create-if-absent initialization and per-cell toggling.
//!
//! # Invariants
//! - Initialization never overwrites an existing grid; header and cells are
//!   written in the same transaction only when the header insert took effect.
//! - A toggle is one `UPSERT` on one cell, so concurrent toggles on different
//!   cells cannot overwrite each other. Same-cell toggles are last-write-wins.

use super::{bool_to_int, ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use crate::model::attendance::{AttendanceGrid, DayRecord};
use crate::model::member::MemberId;
use crate::model::month::MonthKey;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeMap;

/// Repository interface for monthly attendance grids.
pub trait AttendanceRepository {
    fn get_grid(&self, month: MonthKey) -> RepoResult<Option<AttendanceGrid>>;
    /// Persists `grid` unless a grid for its month already exists.
    ///
    /// Returns `true` when this call created the grid.
    fn insert_grid_if_absent(&self, grid: &AttendanceGrid) -> RepoResult<bool>;
    /// Flips one cell and returns the new presence value.
    ///
    /// A missing cell counts as absent, so it is created as present.
    fn toggle_cell(&self, month: MonthKey, day: u32, member_id: MemberId) -> RepoResult<bool>;
}

/// SQLite-backed attendance grids.
pub struct SqliteAttendanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttendanceRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl AttendanceRepository for SqliteAttendanceRepository<'_> {
    fn get_grid(&self, month: MonthKey) -> RepoResult<Option<AttendanceGrid>> {
        // Deferred read transaction keeps header and cells on one snapshot.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let Some(days_in_month) = grid_days(&tx, month)? else {
            return Ok(None);
        };
        if days_in_month != month.days_in_month() {
            return Err(RepoError::InvalidData(format!(
                "grid {month} stores {days_in_month} days, calendar has {}",
                month.days_in_month()
            )));
        }

        let mut days: Vec<DayRecord> = (1..=days_in_month)
            .map(|day| DayRecord {
                day,
                status: BTreeMap::new(),
            })
            .collect();

        {
            let mut stmt = tx.prepare(
                "SELECT day, member_id, present
                 FROM attendance_cells
                 WHERE month_key = ?1
                 ORDER BY day ASC, member_id ASC;",
            )?;
            let mut rows = stmt.query([month.to_string()])?;
            while let Some(row) = rows.next()? {
                let day: u32 = row.get("day")?;
                let member_id: MemberId = row.get("member_id")?;
                let present = int_to_bool(row.get("present")?, "attendance_cells.present")?;
                let record = day
                    .checked_sub(1)
                    .and_then(|index| days.get_mut(index as usize))
                    .ok_or_else(|| {
                        RepoError::InvalidData(format!(
                            "cell day {day} outside grid {month} in attendance_cells.day"
                        ))
                    })?;
                record.status.insert(member_id, present);
            }
        }
        tx.commit()?;

        Ok(Some(AttendanceGrid { month, days }))
    }

    fn insert_grid_if_absent(&self, grid: &AttendanceGrid) -> RepoResult<bool> {
        let month_text = grid.month.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO attendance_grids (month_key, days_in_month)
             VALUES (?1, ?2);",
            params![month_text, grid.days_in_month()],
        )?;
        if inserted == 0 {
            return Ok(false);
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO attendance_cells (month_key, day, member_id, present)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for record in &grid.days {
                for (member_id, present) in &record.status {
                    stmt.execute(params![
                        month_text,
                        record.day,
                        member_id,
                        bool_to_int(*present)
                    ])?;
                }
            }
        }
        tx.commit()?;

        Ok(true)
    }

    fn toggle_cell(&self, month: MonthKey, day: u32, member_id: MemberId) -> RepoResult<bool> {
        let month_text = month.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let days_in_month = grid_days(&tx, month)?.ok_or(RepoError::GridNotFound(month))?;
        if day == 0 || day > days_in_month {
            return Err(RepoError::DayOutOfRange { day, days_in_month });
        }

        tx.execute(
            "INSERT INTO attendance_cells (month_key, day, member_id, present)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT (month_key, day, member_id)
             DO UPDATE SET present = 1 - present;",
            params![month_text, day, member_id],
        )?;
        let present: i64 = tx.query_row(
            "SELECT present
             FROM attendance_cells
             WHERE month_key = ?1 AND day = ?2 AND member_id = ?3;",
            params![month_text, day, member_id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        int_to_bool(present, "attendance_cells.present")
    }
}

fn grid_days(conn: &Connection, month: MonthKey) -> RepoResult<Option<u32>> {
    let days = conn
        .query_row(
            "SELECT days_in_month FROM attendance_grids WHERE month_key = ?1;",
            [month.to_string()],
            |row| row.get::<_, u32>(0),
        )
        .optional()?;
    Ok(days)
}
