//! Expense ledger use-case service.
//!
//! # Responsibility
//! - Validate and record purchases for the acting member.
//! - Enforce creator-only edit/delete.
//! - Publish committed ledger changes to the change feed.
//!
//! # Invariants
//! - `payer_id` is always the acting member at creation and never changes.
//! - A failed operation issues no write and publishes nothing.
//! - `created_at` is preserved across updates.

use crate::error::{EngineError, EngineResult, NotFound, PermissionDenied};
use crate::event::change_feed::Change;
use crate::model::expense::{
    parse_entry_date, well_formed_items, ActorId, EntryId, ExpenseCategory, ExpenseEntry,
    ExpenseItem,
};
use crate::model::member::MemberId;
use crate::model::month::MonthKey;
use crate::repo::expense_repo::{EntryListQuery, ExpenseRepository};
use crate::service::context::EngineContext;
use crate::service::logged;
use crate::service::shift::{can_attribute_proxy, check_attribution};
use log::info;
use std::sync::Arc;

/// Raw input for a new purchase, as collected from a form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryDraft {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `None` or the actor's own id records a direct purchase.
    pub attributed_id: Option<MemberId>,
    /// Raw rows; blank or non-positive rows are dropped.
    pub items: Vec<ExpenseItem>,
    pub category: ExpenseCategory,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryPatch {
    pub date: Option<String>,
    pub attributed_id: Option<MemberId>,
    pub items: Option<Vec<ExpenseItem>>,
    pub category: Option<ExpenseCategory>,
}

/// Listing filters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntryFilter {
    /// Full history.
    #[default]
    All,
    /// Entries paid by the member mapped to this actor.
    Mine(ActorId),
    PaidBy(MemberId),
    AttributedTo(MemberId),
    Month(MonthKey),
}

/// Entry with roster display names resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub entry: ExpenseEntry,
    pub payer_name: Option<String>,
    /// Shown as "bought for" on proxy purchases.
    pub attributed_name: Option<String>,
}

pub struct LedgerService<R: ExpenseRepository> {
    repo: R,
    ctx: Arc<EngineContext>,
}

impl<R: ExpenseRepository> LedgerService<R> {
    /// Ledger over `repo` sharing `ctx` with other services.
    pub fn new(repo: R, ctx: Arc<EngineContext>) -> Self {
        Self { repo, ctx }
    }

    /// Records a purchase paid by `actor`'s member.
    ///
    /// # Errors
    /// - `Validation` for a missing/invalid date, no well-formed items, or
    ///   item prices whose total overflows.
    /// - `Permission` for an unmapped actor or a strict-policy shift breach.
    /// - `NotFound` when `attributed_id` is not rostered.
    /// - `Persistence` when the insert fails.
    pub fn add_entry(&self, draft: EntryDraft, actor: &ActorId) -> EngineResult<EntryId> {
        logged("entry_add", self.add_entry_inner(draft, actor))
    }

    fn add_entry_inner(&self, draft: EntryDraft, actor: &ActorId) -> EngineResult<EntryId> {
        let date = parse_entry_date(&draft.date)?;
        let items = well_formed_items(draft.items)?;
        let payer_id = self.require_member_for(actor)?;
        let attributed_id = draft.attributed_id.unwrap_or(payer_id);
        self.ensure_attributable(payer_id, attributed_id)?;
        check_attribution(
            self.ctx.shift_policy(),
            self.ctx.roster(),
            payer_id,
            attributed_id,
            date,
        )?;

        let mut entry = ExpenseEntry::new(
            date,
            payer_id,
            attributed_id,
            items,
            draft.category,
            actor.clone(),
            self.ctx.clock().now_epoch_ms(),
        )?;
        entry.created_at = self.repo.insert_entry(&entry)?;

        info!(
            "event=entry_add module=service status=ok entry_id={} payer={} attributed={} proxy={} items={} created_at={}",
            entry.id,
            entry.payer_id,
            entry.attributed_id,
            entry.is_proxy,
            entry.items.len(),
            entry.created_at
        );
        self.ctx.feed().publish(Change::EntryAdded(entry.id));
        Ok(entry.id)
    }

    /// Applies `patch` to an entry owned by `actor`.
    ///
    /// Items are re-filtered and the subtotal re-derived when replaced.
    pub fn update_entry(
        &self,
        id: EntryId,
        patch: EntryPatch,
        actor: &ActorId,
    ) -> EngineResult<()> {
        logged("entry_update", self.update_entry_inner(id, patch, actor))
    }

    fn update_entry_inner(
        &self,
        id: EntryId,
        patch: EntryPatch,
        actor: &ActorId,
    ) -> EngineResult<()> {
        let mut entry = self
            .repo
            .get_entry(id)?
            .ok_or(EngineError::NotFound(NotFound::Entry(id)))?;
        ensure_owner(&entry, actor)?;

        if let Some(date) = patch.date.as_deref() {
            entry.date = parse_entry_date(date)?;
        }
        if let Some(items) = patch.items {
            entry.replace_items(well_formed_items(items)?)?;
        }
        if let Some(attributed_id) = patch.attributed_id {
            self.ensure_attributable(entry.payer_id, attributed_id)?;
            entry.attribute_to(attributed_id);
        }
        if let Some(category) = patch.category {
            entry.category = category;
        }
        check_attribution(
            self.ctx.shift_policy(),
            self.ctx.roster(),
            entry.payer_id,
            entry.attributed_id,
            entry.date,
        )?;

        self.repo.update_entry(&entry)?;
        info!(
            "event=entry_update module=service status=ok entry_id={} attributed={} proxy={} items={}",
            entry.id,
            entry.attributed_id,
            entry.is_proxy,
            entry.items.len()
        );
        self.ctx.feed().publish(Change::EntryUpdated(entry.id));
        Ok(())
    }

    /// Deletes an entry owned by `actor`.
    ///
    /// Deleting an entry that no longer exists succeeds without a write.
    pub fn delete_entry(&self, id: EntryId, actor: &ActorId) -> EngineResult<()> {
        logged("entry_delete", self.delete_entry_inner(id, actor))
    }

    fn delete_entry_inner(&self, id: EntryId, actor: &ActorId) -> EngineResult<()> {
        let Some(entry) = self.repo.get_entry(id)? else {
            info!("event=entry_delete module=service status=noop entry_id={id}");
            return Ok(());
        };
        ensure_owner(&entry, actor)?;

        if self.repo.delete_entry(id)? {
            info!("event=entry_delete module=service status=ok entry_id={id}");
            self.ctx.feed().publish(Change::EntryDeleted(id));
        } else {
            info!("event=entry_delete module=service status=noop entry_id={id}");
        }
        Ok(())
    }

    /// Lists entries newest first.
    pub fn list_entries(&self, filter: &EntryFilter) -> EngineResult<Vec<ExpenseEntry>> {
        let query = match filter {
            EntryFilter::All => EntryListQuery::default(),
            EntryFilter::Mine(actor) => EntryListQuery {
                payer_id: Some(self.require_member_for(actor)?),
                ..EntryListQuery::default()
            },
            EntryFilter::PaidBy(member_id) => EntryListQuery {
                payer_id: Some(*member_id),
                ..EntryListQuery::default()
            },
            EntryFilter::AttributedTo(member_id) => EntryListQuery {
                attributed_id: Some(*member_id),
                ..EntryListQuery::default()
            },
            EntryFilter::Month(month) => EntryListQuery {
                month: Some(*month),
                ..EntryListQuery::default()
            },
        };
        Ok(self.repo.list_entries(&query)?)
    }

    /// Same as [`Self::list_entries`] with payer/attributed names resolved.
    pub fn list_entry_views(&self, filter: &EntryFilter) -> EngineResult<Vec<EntryView>> {
        let roster = self.ctx.roster();
        Ok(self
            .list_entries(filter)?
            .into_iter()
            .map(|entry| EntryView {
                payer_name: roster.name_of(entry.payer_id).map(str::to_string),
                attributed_name: roster.name_of(entry.attributed_id).map(str::to_string),
                entry,
            })
            .collect())
    }

    /// Shared engine context.
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Entry by id, as stored.
    pub fn get_entry(&self, id: EntryId) -> EngineResult<Option<ExpenseEntry>> {
        Ok(self.repo.get_entry(id)?)
    }

    fn require_member_for(&self, actor: &ActorId) -> EngineResult<MemberId> {
        let member_id = self
            .ctx
            .resolve_actor(actor)
            .ok_or_else(|| PermissionDenied::UnknownActor(actor.clone()))?;
        self.require_rostered(member_id)?;
        Ok(member_id)
    }

    fn ensure_attributable(
        &self,
        payer_id: MemberId,
        attributed_id: MemberId,
    ) -> EngineResult<()> {
        if !can_attribute_proxy(payer_id, attributed_id, self.ctx.roster()) {
            return Err(EngineError::NotFound(NotFound::Member(attributed_id)));
        }
        Ok(())
    }

    fn require_rostered(&self, member_id: MemberId) -> EngineResult<()> {
        if !self.ctx.roster().contains(member_id) {
            return Err(EngineError::NotFound(NotFound::Member(member_id)));
        }
        Ok(())
    }
}

fn ensure_owner(entry: &ExpenseEntry, actor: &ActorId) -> Result<(), PermissionDenied> {
    if &entry.created_by != actor {
        return Err(PermissionDenied::NotOwner {
            entry_id: entry.id,
            actor: actor.clone(),
        });
    }
    Ok(())
}
