//! Domain model for the shared-kitchen book.
//!
//! # Responsibility
//! - Define canonical data structures used by ledger, attendance and
//!   settlement logic.
//! - Keep validation rules next to the types they protect.
//!
//! # Invariants
//! - Members are identified by a stable `MemberId` assigned in configuration.
//! - Expense entries are identified by a stable `EntryId` that is never reused.
//! - One attendance grid exists per `MonthKey`.

pub mod attendance;
pub mod expense;
pub mod member;
pub mod month;
