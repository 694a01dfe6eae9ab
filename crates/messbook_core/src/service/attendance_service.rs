//! Attendance grid use-case service.
//!
//! # Responsibility
//! - Lazily create the month's all-present grid exactly once.
//! - Toggle single cells for any authenticated actor.
//!
//! # Invariants
//! - Initialization is create-if-absent; a concurrent first access never
//!   overwrites a grid another session already created or edited.
//! - Toggling has no ownership check.

use crate::error::{EngineError, EngineResult, NotFound};
use crate::event::change_feed::Change;
use crate::model::attendance::AttendanceGrid;
use crate::model::member::MemberId;
use crate::model::month::MonthKey;
use crate::repo::attendance_repo::AttendanceRepository;
use crate::service::context::EngineContext;
use crate::service::logged;
use log::info;
use std::sync::Arc;

pub struct AttendanceService<R: AttendanceRepository> {
    repo: R,
    ctx: Arc<EngineContext>,
}

impl<R: AttendanceRepository> AttendanceService<R> {
    /// Attendance over `repo` sharing `ctx` with other services.
    pub fn new(repo: R, ctx: Arc<EngineContext>) -> Self {
        Self { repo, ctx }
    }

    /// Returns the grid for `month`, creating the all-present grid first
    /// when none exists.
    pub fn get_or_init_grid(&self, month: MonthKey) -> EngineResult<AttendanceGrid> {
        logged("grid_get_or_init", self.get_or_init_grid_inner(month))
    }

    fn get_or_init_grid_inner(&self, month: MonthKey) -> EngineResult<AttendanceGrid> {
        if let Some(grid) = self.repo.get_grid(month)? {
            return Ok(grid);
        }

        self.ctx.log_roster_coverage(month);
        let initial = AttendanceGrid::all_present(month, self.ctx.roster());
        if self.repo.insert_grid_if_absent(&initial)? {
            info!(
                "event=grid_init module=service status=ok month={month} days={} members={}",
                initial.days.len(),
                self.ctx.roster().len()
            );
            self.ctx.feed().publish(Change::GridInitialized(month));
        } else {
            info!(
                "event=grid_init module=service status=noop month={month} reason=already_exists"
            );
        }

        // Re-read so the caller sees whichever initialization won.
        self.repo
            .get_grid(month)?
            .ok_or(EngineError::NotFound(NotFound::Grid(month)))
    }

    /// Flips one cell and returns the new presence value.
    ///
    /// # Errors
    /// - `NotFound` for a day outside the month, an unrostered member, or a
    ///   month whose grid was never initialized.
    pub fn toggle_cell(
        &self,
        month: MonthKey,
        day: u32,
        member_id: MemberId,
    ) -> EngineResult<bool> {
        logged("grid_toggle", self.toggle_cell_inner(month, day, member_id))
    }

    fn toggle_cell_inner(
        &self,
        month: MonthKey,
        day: u32,
        member_id: MemberId,
    ) -> EngineResult<bool> {
        let days_in_month = month.days_in_month();
        if day == 0 || day > days_in_month {
            return Err(EngineError::NotFound(NotFound::Day { day, days_in_month }));
        }
        if !self.ctx.roster().contains(member_id) {
            return Err(EngineError::NotFound(NotFound::Member(member_id)));
        }

        let present = self.repo.toggle_cell(month, day, member_id)?;
        info!(
            "event=grid_toggle module=service status=ok month={month} day={day} member={member_id} present={present}"
        );
        self.ctx.feed().publish(Change::CellToggled {
            month,
            day,
            member_id,
            present,
        });
        Ok(present)
    }

    /// Shared engine context.
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Current grid without initializing it.
    pub fn get_grid(&self, month: MonthKey) -> EngineResult<Option<AttendanceGrid>> {
        Ok(self.repo.get_grid(month)?)
    }
}
