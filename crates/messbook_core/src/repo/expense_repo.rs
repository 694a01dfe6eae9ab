//! Expense ledger repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist expense entries with their ordered item rows.
//! - Assign strictly increasing `created_at` values at insert time.
//!
//! # Invariants
//! - Write paths call `ExpenseEntry::validate()` before SQL mutations.
//! - Read paths call only `validate_shape()`: the stored subtotal is returned
//!   as persisted, never recomputed from items.
//! - Updates never touch `created_at` or `seq`.

use super::{bool_to_int, ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use crate::model::expense::{
    ActorId, EntryId, ExpenseCategory, ExpenseEntry, ExpenseItem, ENTRY_DATE_FORMAT,
};
use crate::model::member::MemberId;
use crate::model::month::MonthKey;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::str::FromStr;
use uuid::Uuid;

const ENTRY_SELECT_SQL: &str = "SELECT
    uuid,
    entry_date,
    payer_id,
    attributed_id,
    subtotal,
    category,
    is_proxy,
    created_by,
    created_at
FROM expense_entries";

/// Listing filter; all set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryListQuery {
    pub payer_id: Option<MemberId>,
    pub attributed_id: Option<MemberId>,
    pub month: Option<MonthKey>,
}

/// Repository interface for the expense ledger.
pub trait ExpenseRepository {
    /// Inserts one entry and returns the `created_at` actually stored.
    ///
    /// The stored value is `max(entry.created_at, latest + 1)`.
    fn insert_entry(&self, entry: &ExpenseEntry) -> RepoResult<i64>;
    /// Replaces mutable fields and items of an existing entry.
    fn update_entry(&self, entry: &ExpenseEntry) -> RepoResult<()>;
    fn get_entry(&self, id: EntryId) -> RepoResult<Option<ExpenseEntry>>;
    /// Lists entries newest first (`created_at DESC`, insertion order tie-break).
    fn list_entries(&self, query: &EntryListQuery) -> RepoResult<Vec<ExpenseEntry>>;
    /// Removes one entry; returns `false` when it did not exist.
    fn delete_entry(&self, id: EntryId) -> RepoResult<bool>;
}

/// SQLite-backed expense ledger.
pub struct SqliteExpenseRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteExpenseRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ExpenseRepository for SqliteExpenseRepository<'_> {
    fn insert_entry(&self, entry: &ExpenseEntry) -> RepoResult<i64> {
        entry.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let latest: i64 = tx.query_row(
            "SELECT COALESCE(MAX(created_at), 0) FROM expense_entries;",
            [],
            |row| row.get(0),
        )?;
        let created_at = entry.created_at.max(latest + 1);

        tx.execute(
            "INSERT INTO expense_entries (
                uuid,
                entry_date,
                payer_id,
                attributed_id,
                subtotal,
                category,
                is_proxy,
                created_by,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                entry.id.to_string(),
                entry.date.format(ENTRY_DATE_FORMAT).to_string(),
                entry.payer_id,
                entry.attributed_id,
                entry.subtotal.to_string(),
                entry.category.as_str(),
                bool_to_int(entry.is_proxy),
                entry.created_by.as_str(),
                created_at,
            ],
        )?;
        write_items(&tx, entry.id, &entry.items)?;
        tx.commit()?;

        Ok(created_at)
    }

    fn update_entry(&self, entry: &ExpenseEntry) -> RepoResult<()> {
        entry.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE expense_entries
             SET
                entry_date = ?2,
                attributed_id = ?3,
                subtotal = ?4,
                category = ?5,
                is_proxy = ?6,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                entry.id.to_string(),
                entry.date.format(ENTRY_DATE_FORMAT).to_string(),
                entry.attributed_id,
                entry.subtotal.to_string(),
                entry.category.as_str(),
                bool_to_int(entry.is_proxy),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::EntryNotFound(entry.id));
        }

        tx.execute(
            "DELETE FROM expense_items WHERE entry_uuid = ?1;",
            [entry.id.to_string()],
        )?;
        write_items(&tx, entry.id, &entry.items)?;
        tx.commit()?;

        Ok(())
    }

    fn get_entry(&self, id: EntryId) -> RepoResult<Option<ExpenseEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_entries(&self, query: &EntryListQuery) -> RepoResult<Vec<ExpenseEntry>> {
        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(payer_id) = query.payer_id {
            sql.push_str(" AND payer_id = ?");
            bind_values.push(Value::Integer(i64::from(payer_id)));
        }
        if let Some(attributed_id) = query.attributed_id {
            sql.push_str(" AND attributed_id = ?");
            bind_values.push(Value::Integer(i64::from(attributed_id)));
        }
        if let Some(month) = query.month {
            // Dates are stored as `YYYY-MM-DD`, so the month key is a prefix.
            sql.push_str(" AND substr(entry_date, 1, 7) = ?");
            bind_values.push(Value::Text(month.to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, seq DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(self.conn, row)?);
        }

        Ok(entries)
    }

    fn delete_entry(&self, id: EntryId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM expense_entries WHERE uuid = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }
}

fn write_items(conn: &Connection, entry_id: EntryId, items: &[ExpenseItem]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO expense_items (entry_uuid, position, name, price)
         VALUES (?1, ?2, ?3, ?4);",
    )?;
    for (position, item) in items.iter().enumerate() {
        stmt.execute(params![
            entry_id.to_string(),
            position as i64,
            item.name.as_str(),
            item.price.to_string(),
        ])?;
    }
    Ok(())
}

fn load_items(conn: &Connection, uuid_text: &str) -> RepoResult<Vec<ExpenseItem>> {
    let mut stmt = conn.prepare(
        "SELECT name, price
         FROM expense_items
         WHERE entry_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([uuid_text])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let price_text: String = row.get("price")?;
        items.push(ExpenseItem {
            name: row.get("name")?,
            price: parse_decimal(&price_text, "expense_items.price")?,
        });
    }
    Ok(items)
}

fn parse_entry_row(conn: &Connection, row: &Row<'_>) -> RepoResult<ExpenseEntry> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in expense_entries.uuid"
        ))
    })?;

    let date_text: String = row.get("entry_date")?;
    let date = NaiveDate::parse_from_str(&date_text, ENTRY_DATE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in expense_entries.entry_date"
        ))
    })?;

    let category_text: String = row.get("category")?;
    let category = ExpenseCategory::parse(&category_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid category `{category_text}` in expense_entries.category"
        ))
    })?;

    let subtotal_text: String = row.get("subtotal")?;
    let created_by: String = row.get("created_by")?;

    let entry = ExpenseEntry {
        id,
        date,
        payer_id: row.get("payer_id")?,
        attributed_id: row.get("attributed_id")?,
        items: load_items(conn, &uuid_text)?,
        subtotal: parse_decimal(&subtotal_text, "expense_entries.subtotal")?,
        category,
        is_proxy: int_to_bool(row.get("is_proxy")?, "expense_entries.is_proxy")?,
        created_by: ActorId::new(created_by),
        created_at: row.get("created_at")?,
    };
    entry
        .validate_shape()
        .map_err(|err| RepoError::InvalidData(format!("entry {id}: {err}")))?;
    Ok(entry)
}

fn parse_decimal(value: &str, column: &str) -> RepoResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid decimal `{value}` in {column}")))
}
