//! Step repository: one row per (job, step kind) in `job_steps`.
//!
//! A step row only describes the latest execution; history lives in
//! `content_versions`.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::{StepKind, StepStatus};

use super::DatabaseError;

#[derive(Debug, Clone)]
pub struct StepRow {
    pub id: String,
    pub job_id: String,
    pub step_type: StepKind,
    pub position: i64,
    pub status: StepStatus,
    /// Latest result payload as JSON.
    pub result: Option<String>,
    pub tokens: i64,
    pub cost: i64,
    pub error: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl StepRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            step_type: row.get("step_type")?,
            position: row.get("position")?,
            status: row.get("status")?,
            result: row.get("result")?,
            tokens: row.get("tokens")?,
            cost: row.get("cost")?,
            error: row.get("error")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            duration_ms: row.get("duration_ms")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a PENDING row for a step that is about to be scheduled.
pub fn insert_pending(
    conn: &Connection,
    job_id: &str,
    step: StepKind,
    position: i64,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO job_steps (id, job_id, step_type, position, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            uuid::Uuid::new_v4().to_string(),
            job_id,
            step,
            position,
            StepStatus::Pending,
            now
        ],
    )?;
    Ok(())
}

/// Marks a step IN_PROGRESS, creating the row when the step was never
/// scheduled (e.g. a regeneration of a skipped step).
pub fn mark_in_progress(
    conn: &Connection,
    job_id: &str,
    step: StepKind,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO job_steps (id, job_id, step_type, position, status, started_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(position), -1) + 1 FROM job_steps WHERE job_id = ?2),
                 ?4, ?5, ?5, ?5)
         ON CONFLICT (job_id, step_type) DO UPDATE SET
           status = excluded.status,
           error = NULL,
           started_at = excluded.started_at,
           completed_at = NULL,
           updated_at = excluded.updated_at",
        params![
            uuid::Uuid::new_v4().to_string(),
            job_id,
            step,
            StepStatus::InProgress,
            now
        ],
    )?;
    Ok(())
}

/// Records a successful execution: result payload and usage.
#[allow(clippy::too_many_arguments)]
pub fn mark_completed(
    conn: &Connection,
    job_id: &str,
    step: StepKind,
    result: &str,
    tokens: i64,
    cost: i64,
    duration_ms: i64,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE job_steps SET status = ?3, result = ?4, tokens = ?5, cost = ?6, error = NULL,
         duration_ms = ?7, completed_at = ?8, updated_at = ?8
         WHERE job_id = ?1 AND step_type = ?2",
        params![
            job_id,
            step,
            StepStatus::Completed,
            result,
            tokens,
            cost,
            duration_ms,
            now
        ],
    )?;
    Ok(())
}

/// Records a failed execution. The previous result payload is left in place.
pub fn mark_failed(
    conn: &Connection,
    job_id: &str,
    step: StepKind,
    error: &str,
    duration_ms: i64,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE job_steps SET status = ?3, error = ?4, duration_ms = ?5, completed_at = ?6,
         updated_at = ?6
         WHERE job_id = ?1 AND step_type = ?2",
        params![job_id, step, StepStatus::Failed, error, duration_ms, now],
    )?;
    Ok(())
}

pub fn find(
    conn: &Connection,
    job_id: &str,
    step: StepKind,
) -> Result<Option<StepRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM job_steps WHERE job_id = ?1 AND step_type = ?2",
            params![job_id, step],
            StepRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// All step rows of a job in scheduling order.
pub fn list_for_job(conn: &Connection, job_id: &str) -> Result<Vec<StepRow>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM job_steps WHERE job_id = ?1 ORDER BY position ASC")?;
    let rows = stmt
        .query_map(params![job_id], StepRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
