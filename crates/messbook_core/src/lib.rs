//! Core ledger and settlement engine for a shared-kitchen mess.
//! This crate is the single source of truth for expense, attendance and
//! balance rules.

pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, MessConfig};
pub use error::{EngineError, EngineResult, NotFound, PermissionDenied};
pub use event::change_feed::{Change, ChangeEvent, ChangeFeed, ChangeListener, SubscriptionId};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::attendance::{AttendanceGrid, DayRecord, GridError};
pub use model::expense::{
    ActorId, EntryId, ExpenseCategory, ExpenseEntry, ExpenseItem, ExpenseValidationError,
};
pub use model::member::{Member, MemberId, Roster, RosterError};
pub use model::month::{MonthKey, MonthKeyError};
pub use repo::attendance_repo::{AttendanceRepository, SqliteAttendanceRepository};
pub use repo::expense_repo::{EntryListQuery, ExpenseRepository, SqliteExpenseRepository};
pub use repo::{RepoError, RepoResult};
pub use service::attendance_service::AttendanceService;
pub use service::context::{
    Clock, EngineContext, FixedClock, IdentityResolver, StaticIdentityResolver, SystemClock,
};
pub use service::ledger_service::{EntryDraft, EntryFilter, EntryPatch, EntryView, LedgerService};
pub use service::settlement::{
    compute_settlement, BalanceStatus, MemberSettlement, SettlementReport,
};
pub use service::shift::{
    active_manager, can_attribute_proxy, check_attribution, is_on_shift, ShiftPolicy,
};
pub use service::snapshot::{settlement_for, SettlementWatch, Snapshot};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
