use std::path::PathBuf;
use std::sync::Arc;

use crate::assembler::{ContentAssembler, FinalBundle};
use crate::billing::{CostMeter, PricingTable};
use crate::config::EngineConfig;
use crate::db::audit_repo::{self, AuditRow};
use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::step_repo::{self, StepRow};
use crate::db::{default_database_path, Database};
use crate::error::{EngineError, Result};
use crate::model::StepKind;
use crate::provider::Providers;
use crate::versioning::VersionStore;

use super::context::WorkflowContext;
use super::controller::{find_job, JobController};
use super::executor::StepExecutor;
use super::progress::{NoopProgress, ProgressReporter};
use super::regeneration::RegenerationCoordinator;
use super::result::{StepResult, WorkflowResult};

/// Entry point for request-handling code.
#[derive(Clone)]
pub struct ContentEngine {
    db: Database,
    config: Arc<EngineConfig>,
    versions: VersionStore,
    meter: CostMeter,
    controller: JobController,
    regeneration: RegenerationCoordinator,
    progress: Arc<dyn ProgressReporter>,
}

impl ContentEngine {
    /// Opens the database named by the config (or the default location).
    pub fn open(config: EngineConfig, providers: Providers) -> Result<Self> {
        let path = match &config.database_path {
            Some(path) => PathBuf::from(path),
            None => default_database_path().ok_or_else(|| {
                EngineError::validation("No database_path configured and no home directory")
            })?,
        };
        let db = Database::open(&path)?;
        Ok(Self::new(db, config, providers))
    }

    pub fn new(db: Database, config: EngineConfig, providers: Providers) -> Self {
        let config = Arc::new(config);
        let meter = CostMeter::new(db.clone(), PricingTable::from_config(&config.pricing));
        let executor = StepExecutor::new(db.clone(), config.clone(), providers, meter.clone());
        let assembler = ContentAssembler::new(config.publishing.clone(), config.assembly.clone());
        let regeneration = RegenerationCoordinator::new(db.clone(), executor.clone());
        let controller = JobController::new(db.clone(), config.clone(), executor, assembler);

        Self {
            versions: VersionStore::new(db.clone()),
            db,
            config,
            meter,
            controller,
            regeneration,
            progress: Arc::new(NoopProgress),
        }
    }

    /// Reports job and step transitions to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn meter(&self) -> &CostMeter {
        &self.meter
    }

    /// Runs `steps` for the request.
    ///
    /// When `options.regenerate_step` is set, only that step of the job named
    /// by `context.job_id` is regenerated and the result describes the job
    /// afterwards. A regeneration request without a job id is rejected, and
    /// one naming an unknown job fails with `NotFound`; neither starts a new
    /// pipeline.
    pub fn execute_content_workflow(
        &self,
        context: WorkflowContext,
        steps: &[StepKind],
    ) -> Result<WorkflowResult> {
        match context.options.regenerate_step {
            Some(step) => self.regenerate_from_context(&context, step),
            None => self
                .controller
                .execute_workflow(&context, steps, self.progress.as_ref()),
        }
    }

    fn regenerate_from_context(
        &self,
        context: &WorkflowContext,
        step: StepKind,
    ) -> Result<WorkflowResult> {
        let job_id = context.job_id.as_deref().ok_or_else(|| {
            EngineError::validation("Regenerating a step requires the job_id of an existing job")
        })?;
        let reason = context
            .options
            .regeneration_reason
            .as_deref()
            .unwrap_or("regeneration requested");

        let result = self.regenerate_workflow_step(job_id, step, reason)?;
        let job = find_job(&self.db, job_id)?;
        let final_content = job
            .final_content
            .as_deref()
            .map(serde_json::from_str::<FinalBundle>)
            .transpose()?;
        Ok(WorkflowResult {
            job_id: job.id,
            status: job.status,
            steps: vec![result],
            total_cost: job.total_cost,
            total_tokens: job.total_tokens,
            final_content,
            error: job.error,
        })
    }

    pub fn regenerate_workflow_step(
        &self,
        job_id: &str,
        step: StepKind,
        reason: &str,
    ) -> Result<StepResult> {
        self.regeneration
            .regenerate(job_id, step, reason, self.progress.as_ref())
    }

    pub fn job(&self, job_id: &str) -> Result<JobRow> {
        find_job(&self.db, job_id)
    }

    pub fn jobs(&self, filter: &JobFilter) -> Result<Vec<JobRow>> {
        Ok(self.db.with_conn(|conn| job_repo::query(conn, filter))?)
    }

    pub fn job_steps(&self, job_id: &str) -> Result<Vec<StepRow>> {
        Ok(self
            .db
            .with_conn(|conn| step_repo::list_for_job(conn, job_id))?)
    }

    pub fn audit_log(&self, job_id: &str) -> Result<Vec<AuditRow>> {
        Ok(self
            .db
            .with_conn(|conn| audit_repo::list_for_job(conn, job_id))?)
    }
}
