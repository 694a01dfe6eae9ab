//! Settlement calculator.
//!
//! # Responsibility
//! - Combine ledger entries, the attendance grid and the roster into a
//!   per-member balance report.
//!
//! # Invariants
//! - Pure: no I/O, no hidden state; identical inputs give identical reports.
//! - Only `payer_id` is credited; `attributed_id` feeds `attributed_spent`
//!   for display and never the balance.
//! - `meal_rate` is zero whenever no meals are recorded.
//! - Amounts use exact decimal addition, so results do not depend on the
//!   order of entries or days.
//! - Never panics: sums that leave the decimal range saturate at
//!   `Decimal::MAX` / `Decimal::MIN`.

use crate::model::attendance::AttendanceGrid;
use crate::model::expense::ExpenseEntry;
use crate::model::member::{MemberId, Roster};
use crate::model::month::MonthKey;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Direction of a member's net position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    /// Balance >= 0: the group owes this member.
    Receives,
    /// Balance < 0: this member owes the group.
    Owes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSettlement {
    pub member_id: MemberId,
    pub name: String,
    pub total_meals: u64,
    pub total_spent: Decimal,
    /// Sum of entries attributed to this member's shift. Display only.
    pub attributed_spent: Decimal,
    pub meal_cost: Decimal,
    pub balance: Decimal,
}

impl MemberSettlement {
    /// Get/Give direction of the balance.
    pub fn status(&self) -> BalanceStatus {
        if self.balance >= Decimal::ZERO {
            BalanceStatus::Receives
        } else {
            BalanceStatus::Owes
        }
    }
}

/// Derived, never-persisted projection of balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub month: MonthKey,
    pub total_bazaar_cost: Decimal,
    pub grand_total_meals: u64,
    pub meal_rate: Decimal,
    /// One row per rostered member, in roster order.
    pub members: Vec<MemberSettlement>,
}

impl SettlementReport {
    /// Row for `member_id`, if rostered.
    pub fn member(&self, member_id: MemberId) -> Option<&MemberSettlement> {
        self.members.iter().find(|row| row.member_id == member_id)
    }

    /// Sum of all balances; zero up to division rounding when every payer
    /// is rostered.
    pub fn balance_sum(&self) -> Decimal {
        self.members
            .iter()
            .fold(Decimal::ZERO, |sum, row| sum.saturating_add(row.balance))
    }
}

/// Computes the settlement report.
///
/// Entries paid by members missing from the roster still count toward
/// `total_bazaar_cost` but credit nobody. Grid cells for unrostered members
/// are ignored.
pub fn compute_settlement(
    entries: &[ExpenseEntry],
    grid: &AttendanceGrid,
    roster: &Roster,
) -> SettlementReport {
    let mut spent: BTreeMap<MemberId, Decimal> = BTreeMap::new();
    let mut attributed: BTreeMap<MemberId, Decimal> = BTreeMap::new();
    let mut total_bazaar_cost = Decimal::ZERO;

    for entry in entries {
        total_bazaar_cost = total_bazaar_cost.saturating_add(entry.subtotal);
        accumulate(&mut spent, entry.payer_id, entry.subtotal);
        accumulate(&mut attributed, entry.attributed_id, entry.subtotal);
    }

    let mut meals: BTreeMap<MemberId, u64> = BTreeMap::new();
    let mut grand_total_meals: u64 = 0;
    for record in &grid.days {
        for member_id in roster.ids() {
            if record.is_present(member_id) {
                *meals.entry(member_id).or_insert(0) += 1;
                grand_total_meals += 1;
            }
        }
    }

    let meal_rate = if grand_total_meals > 0 {
        total_bazaar_cost / Decimal::from(grand_total_meals)
    } else {
        Decimal::ZERO
    };

    let members = roster
        .members()
        .iter()
        .map(|member| {
            let total_meals = meals.get(&member.id).copied().unwrap_or(0);
            let total_spent = spent.get(&member.id).copied().unwrap_or(Decimal::ZERO);
            let meal_cost = Decimal::from(total_meals).saturating_mul(meal_rate);
            MemberSettlement {
                member_id: member.id,
                name: member.name.clone(),
                total_meals,
                total_spent,
                attributed_spent: attributed.get(&member.id).copied().unwrap_or(Decimal::ZERO),
                meal_cost,
                balance: total_spent.saturating_sub(meal_cost),
            }
        })
        .collect();

    SettlementReport {
        month: grid.month,
        total_bazaar_cost,
        grand_total_meals,
        meal_rate,
        members,
    }
}

fn accumulate(totals: &mut BTreeMap<MemberId, Decimal>, member_id: MemberId, amount: Decimal) {
    let total = totals.entry(member_id).or_insert(Decimal::ZERO);
    *total = total.saturating_add(amount);
}
