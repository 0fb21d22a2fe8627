//! Ledger repository: append-only `ledger_entries`.
//!
//! The balance of an agency is always the sum of its entries; rows are
//! never updated or deleted.

use rusqlite::{params, Connection, Row};

use crate::model::LedgerEntryType;

use super::DatabaseError;

#[derive(Debug, Clone)]
pub struct LedgerRow {
    pub id: String,
    pub agency_id: String,
    /// Signed amount in billing tokens; debits are negative.
    pub amount: i64,
    pub entry_type: LedgerEntryType,
    pub description: String,
    pub reference: Option<String>,
    /// Free-form metadata as JSON.
    pub metadata: Option<String>,
    pub balance_after: i64,
    pub created_at: String,
}

impl LedgerRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            agency_id: row.get("agency_id")?,
            amount: row.get("amount")?,
            entry_type: row.get("entry_type")?,
            description: row.get("description")?,
            reference: row.get("reference")?,
            metadata: row.get("metadata")?,
            balance_after: row.get("balance_after")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Current balance: the sum of all entries for the agency.
pub fn balance(conn: &Connection, agency_id: &str) -> Result<i64, DatabaseError> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE agency_id = ?1",
        params![agency_id],
        |r| r.get(0),
    )?;
    Ok(total)
}

pub fn insert(conn: &Connection, entry: &LedgerRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO ledger_entries (id, agency_id, amount, entry_type, description, reference,
         metadata, balance_after, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.id,
            entry.agency_id,
            entry.amount,
            entry.entry_type,
            entry.description,
            entry.reference,
            entry.metadata,
            entry.balance_after,
            entry.created_at,
        ],
    )?;
    Ok(())
}

/// Entries for an agency, oldest first.
pub fn list_for_agency(conn: &Connection, agency_id: &str) -> Result<Vec<LedgerRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM ledger_entries WHERE agency_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![agency_id], LedgerRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Entries whose reference matches (e.g. a content version id).
pub fn list_by_reference(conn: &Connection, reference: &str) -> Result<Vec<LedgerRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM ledger_entries WHERE reference = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![reference], LedgerRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
