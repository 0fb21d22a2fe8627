//! Audit trail: what happened to a job and when.

use rusqlite::{params, Connection, Row};

use crate::model::StepKind;

use super::DatabaseError;

/// Audit event names.
pub mod events {
    pub const JOB_SUBMITTED: &str = "job_submitted";
    pub const JOB_COMPLETED: &str = "job_completed";
    pub const JOB_FAILED: &str = "job_failed";
    pub const STEP_STARTED: &str = "step_started";
    pub const STEP_COMPLETED: &str = "step_completed";
    pub const STEP_FAILED: &str = "step_failed";
    pub const STEP_REGENERATED: &str = "step_regenerated";
    pub const VERSION_ACTIVATED: &str = "version_activated";
    pub const VERSION_DELETED: &str = "version_deleted";
    pub const LEDGER_DEBIT: &str = "ledger_debit";
}

#[derive(Debug, Clone)]
pub struct AuditRow {
    pub id: i64,
    pub job_id: String,
    pub step_type: Option<StepKind>,
    pub event: String,
    pub detail: String,
    pub created_at: String,
}

impl AuditRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            step_type: row.get("step_type")?,
            event: row.get("event")?,
            detail: row.get("detail")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn record(
    conn: &Connection,
    job_id: &str,
    step: Option<StepKind>,
    event: &str,
    detail: &str,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (job_id, step_type, event, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![job_id, step, event, detail, now],
    )?;
    Ok(())
}

/// Audit entries of a job in insertion order.
pub fn list_for_job(conn: &Connection, job_id: &str) -> Result<Vec<AuditRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM audit_log WHERE job_id = ?1 ORDER BY id ASC")?;
    let rows = stmt
        .query_map(params![job_id], AuditRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
