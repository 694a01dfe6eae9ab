//! Consistent read snapshots and settlement refresh tracking.
//!
//! # Responsibility
//! - Load one month's committed entries and grid for settlement.
//! - Track, from change notifications, when a settlement view is stale.

use crate::error::EngineResult;
use crate::event::change_feed::{ChangeEvent, ChangeListener};
use crate::model::attendance::AttendanceGrid;
use crate::model::expense::ExpenseEntry;
use crate::model::member::Roster;
use crate::model::month::MonthKey;
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::expense_repo::ExpenseRepository;
use crate::service::attendance_service::AttendanceService;
use crate::service::ledger_service::{EntryFilter, LedgerService};
use crate::service::settlement::{compute_settlement, SettlementReport};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Committed ledger + grid at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Entries dated inside the month, newest first.
    pub entries: Vec<ExpenseEntry>,
    pub grid: AttendanceGrid,
}

impl Snapshot {
    /// Loads the entries dated in `month` and that month's grid,
    /// initializing the grid on first access.
    pub fn capture<E, A>(
        ledger: &LedgerService<E>,
        attendance: &AttendanceService<A>,
        month: MonthKey,
    ) -> EngineResult<Self>
    where
        E: ExpenseRepository,
        A: AttendanceRepository,
    {
        let grid = attendance.get_or_init_grid(month)?;
        let entries = ledger.list_entries(&EntryFilter::Month(month))?;
        Ok(Self { entries, grid })
    }

    /// Settles this snapshot against `roster`.
    pub fn settle(&self, roster: &Roster) -> SettlementReport {
        compute_settlement(&self.entries, &self.grid, roster)
    }
}

/// Captures a snapshot and settles it against the ledger's roster.
pub fn settlement_for<E, A>(
    ledger: &LedgerService<E>,
    attendance: &AttendanceService<A>,
    month: MonthKey,
) -> EngineResult<SettlementReport>
where
    E: ExpenseRepository,
    A: AttendanceRepository,
{
    let snapshot = Snapshot::capture(ledger, attendance, month)?;
    Ok(snapshot.settle(ledger.context().roster()))
}

/// Change listener that marks a settlement view stale.
///
/// Starts stale so the first view is always computed.
#[derive(Debug)]
pub struct SettlementWatch {
    stale: AtomicBool,
    last_revision: AtomicU64,
}

impl Default for SettlementWatch {
    fn default() -> Self {
        Self {
            stale: AtomicBool::new(true),
            last_revision: AtomicU64::new(0),
        }
    }
}

impl SettlementWatch {
    /// Watch that starts stale.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a change arrived since the last refresh.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Revision of the latest change seen.
    pub fn last_revision(&self) -> u64 {
        self.last_revision.load(Ordering::SeqCst)
    }

    /// Recomputes the report when stale; returns `None` when up to date.
    ///
    /// The stale flag is cleared only after a successful recompute.
    pub fn refresh<E, A>(
        &self,
        ledger: &LedgerService<E>,
        attendance: &AttendanceService<A>,
        month: MonthKey,
    ) -> EngineResult<Option<SettlementReport>>
    where
        E: ExpenseRepository,
        A: AttendanceRepository,
    {
        if !self.stale.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        match settlement_for(ledger, attendance, month) {
            Ok(report) => Ok(Some(report)),
            Err(err) => {
                self.stale.store(true, Ordering::SeqCst);
                Err(err)
            }
        }
    }
}

impl ChangeListener for SettlementWatch {
    fn on_change(&self, event: &ChangeEvent) {
        self.last_revision.fetch_max(event.revision, Ordering::SeqCst);
        self.stale.store(true, Ordering::SeqCst);
    }
}
