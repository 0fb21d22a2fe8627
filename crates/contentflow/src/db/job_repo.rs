//! Job repository: CRUD operations for the `jobs` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::JobStatus;

use super::DatabaseError;

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub campaign_id: String,
    pub client_id: String,
    pub agency_id: String,
    pub user_id: String,
    pub status: JobStatus,
    pub total_cost: i64,
    pub total_tokens: i64,
    pub error: Option<String>,
    /// Submission context as JSON.
    pub context: String,
    /// Assembled bundle as JSON, set on completion.
    pub final_content: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            campaign_id: row.get("campaign_id")?,
            client_id: row.get("client_id")?,
            agency_id: row.get("agency_id")?,
            user_id: row.get("user_id")?,
            status: row.get("status")?,
            total_cost: row.get("total_cost")?,
            total_tokens: row.get("total_tokens")?,
            error: row.get("error")?,
            context: row.get("context")?,
            final_content: row.get("final_content")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub agency_id: Option<String>,
    pub campaign_id: Option<String>,
    pub status: Option<JobStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row.
pub fn insert(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, campaign_id, client_id, agency_id, user_id, status,
         total_cost, total_tokens, error, context, final_content, created_at,
         updated_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            job.id,
            job.campaign_id,
            job.client_id,
            job.agency_id,
            job.user_id,
            job.status,
            job.total_cost,
            job.total_tokens,
            job.error,
            job.context,
            job.final_content,
            job.created_at,
            job.updated_at,
            job.completed_at,
        ],
    )?;
    Ok(())
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM jobs WHERE id = ?1",
            params![id],
            JobRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Queries jobs with filters, newest first.
pub fn query(conn: &Connection, filter: &JobFilter) -> Result<Vec<JobRow>, DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref agency_id) = filter.agency_id {
        conditions.push(format!("agency_id = ?{}", param_values.len() + 1));
        param_values.push(Box::new(agency_id.clone()));
    }
    if let Some(ref campaign_id) = filter.campaign_id {
        conditions.push(format!("campaign_id = ?{}", param_values.len() + 1));
        param_values.push(Box::new(campaign_id.clone()));
    }
    if let Some(status) = filter.status {
        conditions.push(format!("status = ?{}", param_values.len() + 1));
        param_values.push(Box::new(status));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let limit = filter.limit.unwrap_or(100) as i64;
    let offset = filter.offset.unwrap_or(0) as i64;
    param_values.push(Box::new(limit));
    param_values.push(Box::new(offset));
    let sql = format!(
        "SELECT * FROM jobs {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
        where_clause,
        param_values.len() - 1,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_ref.as_slice(), JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Updates status, error and completion time of a job.
pub fn update_status(
    conn: &Connection,
    id: &str,
    status: JobStatus,
    error: Option<&str>,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    let completed_at = status.is_terminal().then_some(updated_at);
    conn.execute(
        "UPDATE jobs SET status = ?2, error = ?3, updated_at = ?4,
         completed_at = COALESCE(?5, completed_at)
         WHERE id = ?1",
        params![id, status, error, updated_at, completed_at],
    )?;
    Ok(())
}

/// Adds one step's usage to the running totals. Runs in the same
/// transaction as the version and debit it accounts for.
pub fn add_usage(
    conn: &Connection,
    id: &str,
    cost: i64,
    tokens: i64,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET total_cost = total_cost + ?2, total_tokens = total_tokens + ?3,
         updated_at = ?4 WHERE id = ?1",
        params![id, cost, tokens, updated_at],
    )?;
    if changed == 0 {
        return Err(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
    }
    Ok(())
}

/// Stores the assembled bundle JSON.
pub fn set_final_content(
    conn: &Connection,
    id: &str,
    final_content: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE jobs SET final_content = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, final_content, updated_at],
    )?;
    Ok(())
}
