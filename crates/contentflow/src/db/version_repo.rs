//! Content version repository: immutable snapshots in `content_versions`.
//!
//! Only `status` and `updated_at` are ever updated after insert.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::{StepKind, VersionStatus};

use super::DatabaseError;

#[derive(Debug, Clone)]
pub struct VersionRow {
    pub id: String,
    pub job_id: String,
    pub step_type: StepKind,
    pub version: i64,
    pub schema_version: i64,
    /// Step payload as JSON.
    pub content: String,
    /// Version metadata as JSON.
    pub metadata: String,
    pub status: VersionStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl VersionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            step_type: row.get("step_type")?,
            version: row.get("version")?,
            schema_version: row.get("schema_version")?,
            content: row.get("content")?,
            metadata: row.get("metadata")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Next version number for (job, step): max existing + 1, starting at 1.
/// Deleted versions still count, so numbering never reuses a gap.
pub fn next_version(conn: &Connection, job_id: &str, step: StepKind) -> Result<i64, DatabaseError> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM content_versions WHERE job_id = ?1 AND step_type = ?2",
        params![job_id, step],
        |r| r.get(0),
    )?;
    Ok(max + 1)
}

pub fn insert(conn: &Connection, row: &VersionRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO content_versions (id, job_id, step_type, version, schema_version, content,
         metadata, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            row.id,
            row.job_id,
            row.step_type,
            row.version,
            row.schema_version,
            row.content,
            row.metadata,
            row.status,
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<VersionRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM content_versions WHERE id = ?1",
            params![id],
            VersionRow::from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn find_active(
    conn: &Connection,
    job_id: &str,
    step: StepKind,
) -> Result<Option<VersionRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM content_versions WHERE job_id = ?1 AND step_type = ?2 AND status = ?3",
            params![job_id, step, VersionStatus::Active],
            VersionRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Versions of one (job, step), newest first.
pub fn list_for_step(
    conn: &Connection,
    job_id: &str,
    step: StepKind,
    include_deleted: bool,
) -> Result<Vec<VersionRow>, DatabaseError> {
    let sql = if include_deleted {
        "SELECT * FROM content_versions WHERE job_id = ?1 AND step_type = ?2
         ORDER BY version DESC"
    } else {
        "SELECT * FROM content_versions WHERE job_id = ?1 AND step_type = ?2 AND status != 'DELETED'
         ORDER BY version DESC"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![job_id, step], VersionRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every non-deleted version of a job, grouped by step and newest first.
pub fn list_for_job(conn: &Connection, job_id: &str) -> Result<Vec<VersionRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM content_versions WHERE job_id = ?1 AND status != 'DELETED'
         ORDER BY step_type ASC, version DESC",
    )?;
    let rows = stmt
        .query_map(params![job_id], VersionRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Archives every ACTIVE version of (job, step). Returns the number archived.
pub fn archive_active(
    conn: &Connection,
    job_id: &str,
    step: StepKind,
    now: &str,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE content_versions SET status = ?3, updated_at = ?4
         WHERE job_id = ?1 AND step_type = ?2 AND status = ?5",
        params![
            job_id,
            step,
            VersionStatus::Archived,
            now,
            VersionStatus::Active
        ],
    )?;
    Ok(changed)
}

pub fn set_status(
    conn: &Connection,
    id: &str,
    status: VersionStatus,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE content_versions SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job_repo::{self, tests::sample_job};
    use crate::db::Database;

    const NOW: &str = "2026-01-01T00:00:00Z";

    fn row(id: &str, version: i64, status: VersionStatus) -> VersionRow {
        VersionRow {
            id: id.to_string(),
            job_id: "job-1".to_string(),
            step_type: StepKind::Idea,
            version,
            schema_version: 1,
            content: "{}".to_string(),
            metadata: "{}".to_string(),
            status,
            created_at: NOW.to_string(),
            updated_at: NOW.to_string(),
        }
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| job_repo::insert(conn, &sample_job("job-1")))
            .unwrap();
        db
    }

    #[test]
    fn test_next_version_starts_at_one_and_counts_deleted() {
        let db = test_db();
        db.with_conn(|conn| {
            assert_eq!(next_version(conn, "job-1", StepKind::Idea)?, 1);
            insert(conn, &row("v1", 1, VersionStatus::Archived))?;
            insert(conn, &row("v2", 2, VersionStatus::Deleted))?;
            assert_eq!(next_version(conn, "job-1", StepKind::Idea)?, 3);
            assert_eq!(next_version(conn, "job-1", StepKind::CopyDesign)?, 1);
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_list_for_step_hides_deleted_by_default() {
        let db = test_db();
        db.with_conn(|conn| {
            insert(conn, &row("v1", 1, VersionStatus::Archived))?;
            insert(conn, &row("v2", 2, VersionStatus::Deleted))?;
            insert(conn, &row("v3", 3, VersionStatus::Active))?;

            let visible = list_for_step(conn, "job-1", StepKind::Idea, false)?;
            let versions: Vec<i64> = visible.iter().map(|v| v.version).collect();
            assert_eq!(versions, vec![3, 1]);

            let all = list_for_step(conn, "job-1", StepKind::Idea, true)?;
            assert_eq!(all.len(), 3);
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_archive_active_then_find_active() {
        let db = test_db();
        db.with_conn(|conn| {
            insert(conn, &row("v1", 1, VersionStatus::Active))?;
            assert_eq!(find_active(conn, "job-1", StepKind::Idea)?.unwrap().id, "v1");

            assert_eq!(archive_active(conn, "job-1", StepKind::Idea, NOW)?, 1);
            assert!(find_active(conn, "job-1", StepKind::Idea)?.is_none());

            set_status(conn, "v1", VersionStatus::Active, NOW)?;
            assert_eq!(
                find_by_id(conn, "v1")?.unwrap().status,
                VersionStatus::Active
            );
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }
}
