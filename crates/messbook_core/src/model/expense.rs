//! Expense ("bazaar") entry model.
//!
//! # Responsibility
//! - Define the purchase record shared by ledger and settlement logic.
//! - Filter raw item rows and derive subtotals at write time.
//!
//! # Invariants
//! - `items` is never empty for a persisted entry.
//! - `subtotal == sum(items.price)` when written; the stored subtotal is
//!   authoritative afterwards and is not recomputed on read.
//! - `is_proxy == (attributed_id != payer_id)`.

use crate::model::member::MemberId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one expense entry.
pub type EntryId = Uuid;

/// Accepted date format for entry dates.
pub const ENTRY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Opaque actor identity supplied by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Wraps an identity string as-is.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw identity string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Purchase category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    /// Routine groceries for shared meals.
    #[default]
    Regular,
    /// Out-of-routine purchase (guests, festivals, equipment).
    Extra,
}

impl ExpenseCategory {
    /// Storage name of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Extra => "extra",
        }
    }

    /// Inverse of [`Self::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "regular" => Some(Self::Regular),
            "extra" => Some(Self::Extra),
            _ => None,
        }
    }
}

/// One purchased line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseItem {
    pub name: String,
    pub price: Decimal,
}

impl ExpenseItem {
    /// Raw row; see [`well_formed_items`] for filtering.
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }

    /// Well-formed rows have a non-blank name and a positive price.
    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty() && self.price > Decimal::ZERO
    }
}

/// Validation errors for expense writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenseValidationError {
    MissingDate,
    InvalidDate(String),
    NoValidItems,
    NegativePrice { index: usize },
    SubtotalMismatch { stored: Decimal, computed: Decimal },
    /// Item prices add up past the representable decimal range.
    AmountOverflow,
}

impl Display for ExpenseValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDate => write!(f, "entry date is required"),
            Self::InvalidDate(value) => {
                write!(f, "entry date must be YYYY-MM-DD, got `{value}`")
            }
            Self::NoValidItems => write!(f, "entry needs at least one item with name and price"),
            Self::NegativePrice { index } => write!(f, "item #{index} has a negative price"),
            Self::SubtotalMismatch { stored, computed } => write!(
                f,
                "subtotal {stored} does not match item total {computed}"
            ),
            Self::AmountOverflow => write!(f, "item prices exceed the supported amount range"),
        }
    }
}

impl Error for ExpenseValidationError {}

/// Canonical persisted purchase record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub id: EntryId,
    pub date: NaiveDate,
    /// Member who actually spent the money; the only member credited.
    pub payer_id: MemberId,
    /// Member whose shift the purchase counts against. Display only.
    pub attributed_id: MemberId,
    pub items: Vec<ExpenseItem>,
    pub subtotal: Decimal,
    pub category: ExpenseCategory,
    pub is_proxy: bool,
    pub created_by: ActorId,
    /// Epoch milliseconds, strictly increasing in insertion order.
    pub created_at: i64,
}

impl ExpenseEntry {
    /// Builds a new entry with a fresh id and a derived subtotal.
    ///
    /// `items` must already be filtered with [`well_formed_items`].
    pub fn new(
        date: NaiveDate,
        payer_id: MemberId,
        attributed_id: MemberId,
        items: Vec<ExpenseItem>,
        category: ExpenseCategory,
        created_by: ActorId,
        created_at: i64,
    ) -> Result<Self, ExpenseValidationError> {
        let subtotal = subtotal_of(&items)?;
        Ok(Self {
            id: Uuid::new_v4(),
            date,
            payer_id,
            attributed_id,
            items,
            subtotal,
            category,
            is_proxy: payer_id != attributed_id,
            created_by,
            created_at,
        })
    }

    /// Replaces items and re-derives the subtotal.
    ///
    /// Leaves the entry untouched when the new total overflows.
    pub fn replace_items(
        &mut self,
        items: Vec<ExpenseItem>,
    ) -> Result<(), ExpenseValidationError> {
        self.subtotal = subtotal_of(&items)?;
        self.items = items;
        Ok(())
    }

    /// Re-targets attribution and keeps `is_proxy` consistent.
    pub fn attribute_to(&mut self, member_id: MemberId) {
        self.attributed_id = member_id;
        self.is_proxy = self.payer_id != member_id;
    }

    /// Full write-time validation, including the subtotal invariant.
    pub fn validate(&self) -> Result<(), ExpenseValidationError> {
        self.validate_shape()?;
        let computed = subtotal_of(&self.items)?;
        if computed != self.subtotal {
            return Err(ExpenseValidationError::SubtotalMismatch {
                stored: self.subtotal,
                computed,
            });
        }
        Ok(())
    }

    /// Structural checks that also apply to persisted rows on read.
    ///
    /// Deliberately skips the subtotal comparison.
    pub fn validate_shape(&self) -> Result<(), ExpenseValidationError> {
        if self.items.is_empty() {
            return Err(ExpenseValidationError::NoValidItems);
        }
        if let Some(index) = self
            .items
            .iter()
            .position(|item| item.price < Decimal::ZERO)
        {
            return Err(ExpenseValidationError::NegativePrice { index });
        }
        Ok(())
    }
}

/// Parses a user-supplied entry date.
pub fn parse_entry_date(value: &str) -> Result<NaiveDate, ExpenseValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ExpenseValidationError::MissingDate);
    }
    NaiveDate::parse_from_str(trimmed, ENTRY_DATE_FORMAT)
        .map_err(|_| ExpenseValidationError::InvalidDate(trimmed.to_string()))
}

/// Keeps well-formed rows (names trimmed).
///
/// Fails when none remain or when the kept prices cannot be summed.
pub fn well_formed_items(
    items: Vec<ExpenseItem>,
) -> Result<Vec<ExpenseItem>, ExpenseValidationError> {
    let kept: Vec<ExpenseItem> = items
        .into_iter()
        .filter(ExpenseItem::is_well_formed)
        .map(|item| ExpenseItem {
            name: item.name.trim().to_string(),
            price: item.price,
        })
        .collect();
    if kept.is_empty() {
        return Err(ExpenseValidationError::NoValidItems);
    }
    subtotal_of(&kept)?;
    Ok(kept)
}

/// Exact sum of item prices.
pub fn subtotal_of(items: &[ExpenseItem]) -> Result<Decimal, ExpenseValidationError> {
    items.iter().try_fold(Decimal::ZERO, |total, item| {
        total
            .checked_add(item.price)
            .ok_or(ExpenseValidationError::AmountOverflow)
    })
}
