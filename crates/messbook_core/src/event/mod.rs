//! Change notification for ledger and attendance writes.
//!
//! # Responsibility
//! - Let observers react to committed writes instead of polling.
//!
//! # Invariants
//! - Only committed writes are published.
//! - Revisions are strictly increasing per feed.

pub mod change_feed;
