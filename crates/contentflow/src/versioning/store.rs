use rusqlite::Connection;

use crate::content::{StepContent, SCHEMA_VERSION};
use crate::db::audit_repo::{self, events};
use crate::db::version_repo::{self, VersionRow};
use crate::db::{now_timestamp, Database};
use crate::error::{EngineError, Result};
use crate::model::{StepKind, VersionStatus};

use super::diff::{self, VersionComparison};
use super::{ContentVersion, StepHistory, VersionMetadata};

#[derive(Clone)]
pub struct VersionStore {
    db: Database,
}

impl VersionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stores `content` as the next version of (job, step) and makes it the
    /// ACTIVE one, archiving whatever was ACTIVE before.
    pub fn create_version(
        &self,
        job_id: &str,
        step: StepKind,
        content: &StepContent,
        metadata: VersionMetadata,
    ) -> Result<ContentVersion> {
        self.db
            .with_tx(|tx| Self::create_version_in(tx, job_id, step, content, metadata))
    }

    /// [`VersionStore::create_version`] on an open transaction, so the write
    /// can share a commit with the ledger debit and the step row.
    pub(crate) fn create_version_in(
        conn: &Connection,
        job_id: &str,
        step: StepKind,
        content: &StepContent,
        mut metadata: VersionMetadata,
    ) -> Result<ContentVersion> {
        if content.kind() != step {
            return Err(EngineError::validation(format!(
                "Cannot store {} content as a {} version",
                content.kind(),
                step
            )));
        }

        if metadata.parent_version_id.is_none() {
            metadata.parent_version_id = match version_repo::find_active(conn, job_id, step)? {
                Some(active) => Some(active.id),
                None => version_repo::list_for_step(conn, job_id, step, false)?
                    .into_iter()
                    .next()
                    .map(|row| row.id),
            };
        }

        let now = now_timestamp();
        let version = version_repo::next_version(conn, job_id, step)?;
        version_repo::archive_active(conn, job_id, step, &now)?;

        let row = VersionRow {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            step_type: step,
            version,
            schema_version: SCHEMA_VERSION,
            content: serde_json::to_string(content)?,
            metadata: serde_json::to_string(&metadata)?,
            status: VersionStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        };
        version_repo::insert(conn, &row)?;
        log::debug!("Stored {} v{} for job {}", step, version, job_id);

        Ok(ContentVersion {
            id: row.id,
            job_id: row.job_id,
            step,
            version,
            schema_version: SCHEMA_VERSION,
            content: content.clone(),
            metadata,
            status: VersionStatus::Active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// Non-deleted versions, newest first, plus the current one.
    pub fn get_step_history(&self, job_id: &str, step: StepKind) -> Result<StepHistory> {
        self.history(job_id, step, false)
    }

    pub fn get_step_history_including_deleted(
        &self,
        job_id: &str,
        step: StepKind,
    ) -> Result<StepHistory> {
        self.history(job_id, step, true)
    }

    fn history(&self, job_id: &str, step: StepKind, include_deleted: bool) -> Result<StepHistory> {
        let versions = self.db.with_conn(|conn| {
            version_repo::list_for_step(conn, job_id, step, include_deleted)?
                .into_iter()
                .map(ContentVersion::try_from)
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(StepHistory::new(job_id, step, versions))
    }

    /// The ACTIVE version of (job, step), falling back to the newest
    /// non-deleted one.
    pub fn current_version(&self, job_id: &str, step: StepKind) -> Result<Option<ContentVersion>> {
        self.db
            .with_conn(|conn| Self::current_version_in(conn, job_id, step))
    }

    pub(crate) fn current_version_in(
        conn: &Connection,
        job_id: &str,
        step: StepKind,
    ) -> Result<Option<ContentVersion>> {
        let row = match version_repo::find_active(conn, job_id, step)? {
            Some(row) => Some(row),
            None => version_repo::list_for_step(conn, job_id, step, false)?
                .into_iter()
                .next(),
        };
        row.map(ContentVersion::try_from).transpose()
    }

    pub fn get_version(&self, id: &str) -> Result<ContentVersion> {
        self.db.with_conn(|conn| Self::load(conn, id))
    }

    /// Every non-deleted version of a job.
    pub fn list_job_versions(&self, job_id: &str) -> Result<Vec<ContentVersion>> {
        self.db.with_conn(|conn| {
            version_repo::list_for_job(conn, job_id)?
                .into_iter()
                .map(ContentVersion::try_from)
                .collect()
        })
    }

    /// Makes `id` the ACTIVE version of its (job, step). Activating the
    /// version that is already ACTIVE changes nothing.
    pub fn activate_version(&self, id: &str) -> Result<ContentVersion> {
        self.db.with_tx(|tx| {
            let mut target = Self::load(tx, id)?;
            match target.status {
                VersionStatus::Active => return Ok(target),
                VersionStatus::Deleted => {
                    return Err(EngineError::OperationNotAllowed(format!(
                        "version {} of {} is deleted and cannot be activated",
                        target.version, target.step
                    )))
                }
                VersionStatus::Archived => {}
            }

            let now = now_timestamp();
            version_repo::archive_active(tx, &target.job_id, target.step, &now)?;
            version_repo::set_status(tx, id, VersionStatus::Active, &now)?;
            audit_repo::record(
                tx,
                &target.job_id,
                Some(target.step),
                events::VERSION_ACTIVATED,
                &format!("version {}", target.version),
                &now,
            )?;

            target.status = VersionStatus::Active;
            target.updated_at = now;
            Ok(target)
        })
    }

    /// Soft-deletes a version. The ACTIVE version cannot be deleted until
    /// another one is activated.
    pub fn delete_version(&self, id: &str) -> Result<ContentVersion> {
        self.db.with_tx(|tx| {
            let mut target = Self::load(tx, id)?;
            match target.status {
                VersionStatus::Active => {
                    return Err(EngineError::OperationNotAllowed(format!(
                        "version {} of {} is active; activate another version first",
                        target.version, target.step
                    )))
                }
                VersionStatus::Deleted => return Ok(target),
                VersionStatus::Archived => {}
            }

            let now = now_timestamp();
            version_repo::set_status(tx, id, VersionStatus::Deleted, &now)?;
            audit_repo::record(
                tx,
                &target.job_id,
                Some(target.step),
                events::VERSION_DELETED,
                &format!("version {}", target.version),
                &now,
            )?;

            target.status = VersionStatus::Deleted;
            target.updated_at = now;
            Ok(target)
        })
    }

    pub fn compare_versions(&self, id_a: &str, id_b: &str) -> Result<VersionComparison> {
        let (a, b) = self.db.with_conn(|conn| {
            let a = Self::load(conn, id_a)?;
            let b = Self::load(conn, id_b)?;
            Ok::<_, EngineError>((a, b))
        })?;
        diff::compare(&a, &b)
    }

    fn load(conn: &Connection, id: &str) -> Result<ContentVersion> {
        version_repo::find_by_id(conn, id)?
            .ok_or_else(|| EngineError::not_found("content version", id))?
            .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::IdeaContent;
    use crate::db::job_repo::{self, tests::sample_job};

    fn store() -> VersionStore {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| job_repo::insert(conn, &sample_job("job-1")))
            .unwrap();
        VersionStore::new(db)
    }

    fn idea(title: &str) -> StepContent {
        StepContent::Idea(IdeaContent {
            title: title.to_string(),
            concept: "concept".to_string(),
            key_messages: vec![],
            target_emotion: None,
        })
    }

    #[test]
    fn test_create_version_numbers_and_activates() {
        let store = store();
        let v1 = store
            .create_version("job-1", StepKind::Idea, &idea("one"), VersionMetadata::default())
            .unwrap();
        let v2 = store
            .create_version("job-1", StepKind::Idea, &idea("two"), VersionMetadata::default())
            .unwrap();

        assert_eq!((v1.version, v2.version), (1, 2));
        assert_eq!(v2.metadata.parent_version_id.as_deref(), Some(v1.id.as_str()));

        let history = store.get_step_history("job-1", StepKind::Idea).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.versions[0].version, 2);
        assert_eq!(history.current_version.unwrap().id, v2.id);
        assert_eq!(
            store.get_version(&v1.id).unwrap().status,
            VersionStatus::Archived
        );
    }

    #[test]
    fn test_create_version_rejects_kind_mismatch() {
        let store = store();
        let err = store
            .create_version(
                "job-1",
                StepKind::CopyDesign,
                &idea("one"),
                VersionMetadata::default(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_activate_is_idempotent_and_archives_others() {
        let store = store();
        let v1 = store
            .create_version("job-1", StepKind::Idea, &idea("one"), VersionMetadata::default())
            .unwrap();
        let v2 = store
            .create_version("job-1", StepKind::Idea, &idea("two"), VersionMetadata::default())
            .unwrap();

        store.activate_version(&v1.id).unwrap();
        let again = store.activate_version(&v1.id).unwrap();
        assert!(again.is_active());
        assert_eq!(
            store.get_version(&v2.id).unwrap().status,
            VersionStatus::Archived
        );

        let active: Vec<_> = store
            .list_job_versions("job-1")
            .unwrap()
            .into_iter()
            .filter(|v| v.is_active())
            .collect();
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn test_delete_active_is_not_allowed() {
        let store = store();
        let v1 = store
            .create_version("job-1", StepKind::Idea, &idea("one"), VersionMetadata::default())
            .unwrap();
        let err = store.delete_version(&v1.id).unwrap_err();
        assert!(matches!(err, EngineError::OperationNotAllowed(_)));
    }

    #[test]
    fn test_deleted_versions_leave_default_history() {
        let store = store();
        let v1 = store
            .create_version("job-1", StepKind::Idea, &idea("one"), VersionMetadata::default())
            .unwrap();
        store
            .create_version("job-1", StepKind::Idea, &idea("two"), VersionMetadata::default())
            .unwrap();

        store.delete_version(&v1.id).unwrap();
        assert_eq!(
            store.get_step_history("job-1", StepKind::Idea).unwrap().len(),
            1
        );
        assert_eq!(
            store
                .get_step_history_including_deleted("job-1", StepKind::Idea)
                .unwrap()
                .len(),
            2
        );

        let err = store.activate_version(&v1.id).unwrap_err();
        assert!(matches!(err, EngineError::OperationNotAllowed(_)));

        // numbering keeps counting past deleted versions
        let v3 = store
            .create_version("job-1", StepKind::Idea, &idea("three"), VersionMetadata::default())
            .unwrap();
        assert_eq!(v3.version, 3);
    }

    #[test]
    fn test_missing_version_is_not_found() {
        let store = store();
        assert!(matches!(
            store.get_version("nope"),
            Err(EngineError::NotFound { .. })
        ));
    }
}
