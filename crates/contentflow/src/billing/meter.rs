use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::ledger_repo::{self, LedgerRow};
use crate::db::{now_timestamp, Database, DatabaseError};
use crate::error::{EngineError, Result};
use crate::model::{ImageQuality, LedgerEntryType, StepKind};

use super::pricing::{Operation, PricingTable};

/// One row of an agency's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub agency_id: String,
    pub amount: i64,
    pub entry_type: LedgerEntryType,
    pub description: String,
    pub reference: Option<String>,
    pub metadata: Option<Value>,
    pub balance_after: i64,
    pub created_at: String,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = DatabaseError;

    fn try_from(row: LedgerRow) -> std::result::Result<Self, Self::Error> {
        let metadata = row
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DatabaseError::Json {
                column: "ledger_entries.metadata",
                source: e,
            })?;
        Ok(Self {
            id: row.id,
            agency_id: row.agency_id,
            amount: row.amount,
            entry_type: row.entry_type,
            description: row.description,
            reference: row.reference,
            metadata,
            balance_after: row.balance_after,
            created_at: row.created_at,
        })
    }
}

/// Prices operations and keeps the per-agency prepaid balance.
///
/// The balance is never stored; it is the sum of the agency's ledger
/// entries. Debits are only ever appended after a successful generation.
#[derive(Clone)]
pub struct CostMeter {
    db: Database,
    pricing: PricingTable,
}

impl CostMeter {
    pub fn new(db: Database, pricing: PricingTable) -> Self {
        Self { db, pricing }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Price of running `step` with the given image options. Text steps
    /// ignore quality and variations.
    pub fn price(&self, step: StepKind, quality: ImageQuality, variations: u32) -> Result<i64> {
        self.pricing.price(Operation::for_step(step, quality, variations))
    }

    pub fn to_money(&self, amount: i64) -> f64 {
        self.pricing.to_money(amount)
    }

    pub fn balance(&self, agency_id: &str) -> Result<i64> {
        self.db
            .with_conn(|conn| ledger_repo::balance(conn, agency_id).map_err(EngineError::from))
    }

    /// Non-locking read: a concurrent debit may land between this check and
    /// the caller's own debit. [`CostMeter::debit`] re-checks.
    pub fn check_balance(&self, agency_id: &str, amount: i64) -> Result<bool> {
        Ok(self.balance(agency_id)? >= amount)
    }

    /// Appends a USAGE entry in its own transaction.
    pub fn debit(
        &self,
        agency_id: &str,
        amount: i64,
        description: &str,
        reference: Option<&str>,
        metadata: Option<&Value>,
    ) -> Result<LedgerEntry> {
        self.db
            .with_tx(|tx| Self::debit_in(tx, agency_id, amount, description, reference, metadata))
    }

    /// Appends a USAGE entry on an open connection or transaction. The
    /// balance is read again here, so callers holding the connection lock
    /// cannot overdraw.
    pub(crate) fn debit_in(
        conn: &Connection,
        agency_id: &str,
        amount: i64,
        description: &str,
        reference: Option<&str>,
        metadata: Option<&Value>,
    ) -> Result<LedgerEntry> {
        if amount < 0 {
            return Err(EngineError::validation(format!(
                "Debit amount must not be negative: {}",
                amount
            )));
        }

        let available = ledger_repo::balance(conn, agency_id)?;
        if available < amount {
            return Err(EngineError::InsufficientBalance {
                agency_id: agency_id.to_string(),
                required: amount,
                available,
            });
        }

        let row = LedgerRow {
            id: uuid::Uuid::new_v4().to_string(),
            agency_id: agency_id.to_string(),
            amount: -amount,
            entry_type: LedgerEntryType::Usage,
            description: description.to_string(),
            reference: reference.map(str::to_string),
            metadata: metadata.map(serde_json::to_string).transpose()?,
            balance_after: available - amount,
            created_at: now_timestamp(),
        };
        ledger_repo::insert(conn, &row)?;
        log::debug!(
            "Debited {} from agency {} (balance {})",
            amount,
            agency_id,
            row.balance_after
        );

        Ok(row.try_into()?)
    }

    /// Appends a top-up, refund or manual adjustment.
    ///
    /// Purchases and refunds must be positive; adjustments may be signed but
    /// not zero. USAGE entries are only written through [`CostMeter::debit`].
    pub fn credit(
        &self,
        agency_id: &str,
        amount: i64,
        entry_type: LedgerEntryType,
        description: &str,
        reference: Option<&str>,
    ) -> Result<LedgerEntry> {
        match entry_type {
            LedgerEntryType::Usage => {
                return Err(EngineError::OperationNotAllowed(
                    "usage entries are written by debit".to_string(),
                ))
            }
            LedgerEntryType::Purchase | LedgerEntryType::Refund if amount <= 0 => {
                return Err(EngineError::validation(format!(
                    "{} amount must be positive: {}",
                    entry_type, amount
                )))
            }
            LedgerEntryType::Adjustment if amount == 0 => {
                return Err(EngineError::validation("Adjustment amount must not be zero"))
            }
            _ => {}
        }

        self.db.with_tx(|tx| {
            let balance = ledger_repo::balance(tx, agency_id)?;
            let row = LedgerRow {
                id: uuid::Uuid::new_v4().to_string(),
                agency_id: agency_id.to_string(),
                amount,
                entry_type,
                description: description.to_string(),
                reference: reference.map(str::to_string),
                metadata: None,
                balance_after: balance + amount,
                created_at: now_timestamp(),
            };
            ledger_repo::insert(tx, &row)?;
            log::info!(
                "{} of {} for agency {} (balance {})",
                entry_type,
                amount,
                agency_id,
                row.balance_after
            );
            Ok(row.try_into()?)
        })
    }

    /// Ledger of an agency, oldest first.
    pub fn entries(&self, agency_id: &str) -> Result<Vec<LedgerEntry>> {
        self.db.with_conn(|conn| {
            ledger_repo::list_for_agency(conn, agency_id)?
                .into_iter()
                .map(|row| LedgerEntry::try_from(row).map_err(EngineError::from))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PricingConfig;

    fn meter() -> CostMeter {
        let db = Database::open_in_memory().unwrap();
        CostMeter::new(db, PricingTable::from_config(&PricingConfig::default()))
    }

    #[test]
    fn test_credit_then_debit() {
        let meter = meter();
        meter
            .credit("agency-1", 100, LedgerEntryType::Purchase, "top-up", None)
            .unwrap();
        assert!(meter.check_balance("agency-1", 100).unwrap());
        assert!(!meter.check_balance("agency-1", 101).unwrap());

        let entry = meter
            .debit("agency-1", 30, "IDEA", Some("version-1"), None)
            .unwrap();
        assert_eq!(entry.amount, -30);
        assert_eq!(entry.balance_after, 70);
        assert_eq!(entry.entry_type, LedgerEntryType::Usage);
        assert_eq!(meter.balance("agency-1").unwrap(), 70);
    }

    #[test]
    fn test_debit_refuses_to_overdraw() {
        let meter = meter();
        meter
            .credit("agency-1", 20, LedgerEntryType::Purchase, "top-up", None)
            .unwrap();
        let err = meter.debit("agency-1", 25, "IDEA", None, None).unwrap_err();
        match err {
            EngineError::InsufficientBalance {
                required,
                available,
                ..
            } => {
                assert_eq!(required, 25);
                assert_eq!(available, 20);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(meter.entries("agency-1").unwrap().len(), 1);
    }

    #[test]
    fn test_credit_rejects_usage_and_non_positive_purchases() {
        let meter = meter();
        assert!(matches!(
            meter.credit("a", 10, LedgerEntryType::Usage, "x", None),
            Err(EngineError::OperationNotAllowed(_))
        ));
        assert!(meter
            .credit("a", 0, LedgerEntryType::Purchase, "x", None)
            .is_err());
        let adjustment = meter
            .credit("a", -5, LedgerEntryType::Adjustment, "correction", None)
            .unwrap();
        assert_eq!(adjustment.balance_after, -5);
    }

    #[test]
    fn test_debit_metadata_round_trips() {
        let meter = meter();
        meter
            .credit("a", 50, LedgerEntryType::Purchase, "top-up", None)
            .unwrap();
        let metadata = serde_json::json!({"job_id": "job-1", "step": "IDEA"});
        meter
            .debit("a", 10, "IDEA", Some("v1"), Some(&metadata))
            .unwrap();
        let entries = meter.entries("a").unwrap();
        assert_eq!(entries[1].metadata.as_ref(), Some(&metadata));
        assert!((meter.to_money(10) - 0.1).abs() < 1e-9);
    }
}
