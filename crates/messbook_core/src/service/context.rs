//! Shared engine context injected into services.
//!
//! # Responsibility
//! - Carry the roster, identity resolver, clock, shift policy and change feed.
//! - Keep every external collaborator behind a trait so tests can swap them.

use crate::config::MessConfig;
use crate::event::change_feed::ChangeFeed;
use crate::model::expense::ActorId;
use crate::model::member::{Member, MemberId, Roster};
use crate::model::month::MonthKey;
use crate::service::shift::{active_manager, ShiftPolicy};
use chrono::{Datelike, Local, NaiveDate, Utc};
use log::warn;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps an authenticated actor to a roster member.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, actor: &ActorId) -> Option<MemberId>;
}

/// Identity map loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentityResolver {
    identities: BTreeMap<String, MemberId>,
}

impl StaticIdentityResolver {
    /// Resolver over an actor -> member map.
    pub fn new(identities: BTreeMap<String, MemberId>) -> Self {
        Self { identities }
    }

    /// Adds or replaces one mapping.
    pub fn with_identity(mut self, actor: impl Into<String>, member_id: MemberId) -> Self {
        self.identities.insert(actor.into(), member_id);
        self
    }
}

impl IdentityResolver for StaticIdentityResolver {
    fn resolve(&self, actor: &ActorId) -> Option<MemberId> {
        self.identities.get(actor.as_str()).copied()
    }
}

/// Wall-clock source for `created_at` stamps and "today".
pub trait Clock: Send + Sync {
    fn now_epoch_ms(&self) -> i64;
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Frozen clock, mainly for tests and replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub epoch_ms: i64,
    pub date: NaiveDate,
}

impl Clock for FixedClock {
    fn now_epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    fn today(&self) -> NaiveDate {
        self.date
    }
}

/// Collaborators shared by ledger and attendance services.
pub struct EngineContext {
    roster: Roster,
    identities: Box<dyn IdentityResolver>,
    shift_policy: ShiftPolicy,
    clock: Box<dyn Clock>,
    feed: Arc<ChangeFeed>,
}

impl EngineContext {
    /// Context with the permissive policy, system clock and a fresh feed.
    pub fn new(roster: Roster, identities: impl IdentityResolver + 'static) -> Self {
        Self {
            roster,
            identities: Box::new(identities),
            shift_policy: ShiftPolicy::default(),
            clock: Box::new(SystemClock),
            feed: Arc::new(ChangeFeed::new()),
        }
    }

    /// Context built from a loaded [`MessConfig`].
    pub fn from_config(config: MessConfig) -> Self {
        let resolver = config.identity_resolver();
        Self::new(config.members, resolver).with_shift_policy(config.shift_policy)
    }

    /// Overrides the shift policy.
    pub fn with_shift_policy(mut self, policy: ShiftPolicy) -> Self {
        self.shift_policy = policy;
        self
    }

    /// Overrides the clock, e.g. with [`FixedClock`] in tests.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Shares an existing feed, e.g. one feed observed across sessions.
    pub fn with_change_feed(mut self, feed: Arc<ChangeFeed>) -> Self {
        self.feed = feed;
        self
    }

    /// Configured roster.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Active shift policy.
    pub fn shift_policy(&self) -> ShiftPolicy {
        self.shift_policy
    }

    /// Clock used for `created_at` and duty lookups.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Feed that receives committed changes.
    pub fn feed(&self) -> &Arc<ChangeFeed> {
        &self.feed
    }

    /// Member mapped to `actor`, if any.
    pub fn resolve_actor(&self, actor: &ActorId) -> Option<MemberId> {
        self.identities.resolve(actor)
    }

    /// Member on duty for the clock's current date.
    pub fn manager_on_duty(&self) -> Option<&Member> {
        active_manager(self.clock.today().day(), &self.roster)
    }

    /// Logs roster gaps and overlaps for `month`; returns whether any exist.
    pub fn log_roster_coverage(&self, month: MonthKey) -> bool {
        let days = month.days_in_month();
        let gaps = self.roster.coverage_gaps(days);
        let overlaps = self.roster.overlapping_days(days);
        if !gaps.is_empty() {
            warn!(
                "event=roster_coverage module=config status=warn month={month} uncovered_days={gaps:?}"
            );
        }
        if !overlaps.is_empty() {
            warn!(
                "event=roster_coverage module=config status=warn month={month} overlapping_days={overlaps:?}"
            );
        }
        !gaps.is_empty() || !overlaps.is_empty()
    }
}
