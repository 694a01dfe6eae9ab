//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into ledger, attendance, settlement and
//!   shift-authorization operations.
//! - Keep callers decoupled from storage details.

use crate::error::EngineResult;
use log::warn;

pub mod attendance_service;
pub mod context;
pub mod ledger_service;
pub mod settlement;
pub mod shift;
pub mod snapshot;

/// Emits one `status=error` event for a failed operation and passes the
/// result through.
pub(crate) fn logged<T>(event: &'static str, result: EngineResult<T>) -> EngineResult<T> {
    if let Err(err) = &result {
        warn!(
            "event={event} module=service status=error error_code={} retryable={} error={err}",
            err.code(),
            err.is_retryable()
        );
    }
    result
}
