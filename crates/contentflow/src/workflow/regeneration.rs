use tracing::{info, info_span};

use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::model::StepKind;
use crate::versioning::VersionStore;

use super::context::{StepOutputs, WorkflowContext};
use super::controller::find_job;
use super::executor::{StepExecutor, StepRequest};
use super::progress::ProgressReporter;
use super::result::StepResult;

/// Re-runs one step of an existing job.
///
/// The step sees the current version of every other step of the job. Steps
/// that consumed the old output are not re-run; that is up to the caller.
/// The regeneration's usage lands on the job totals in the same commit as
/// its version and debit; the job status is left as it is.
#[derive(Clone)]
pub struct RegenerationCoordinator {
    db: Database,
    executor: StepExecutor,
}

impl RegenerationCoordinator {
    pub fn new(db: Database, executor: StepExecutor) -> Self {
        Self { db, executor }
    }

    pub fn regenerate(
        &self,
        job_id: &str,
        step: StepKind,
        reason: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<StepResult> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("A regeneration reason is required"));
        }

        let job = find_job(&self.db, job_id)?;
        if !job.status.is_terminal() {
            return Err(EngineError::OperationNotAllowed(format!(
                "job {} is {}; wait for it to finish before regenerating",
                job_id, job.status
            )));
        }
        let context: WorkflowContext = serde_json::from_str(&job.context)?;

        let _span = info_span!("regeneration", %job_id, %step).entered();
        let outputs = self.current_outputs(job_id, step)?;
        info!(inputs = outputs.len(), %reason, "Regenerating step");

        let request = StepRequest {
            job_id,
            step,
            context: &context,
            outputs: &outputs,
            regeneration_reason: Some(reason),
        };
        self.executor.execute_step(&request, progress)
    }

    /// The current version of every step except `skip`.
    fn current_outputs(&self, job_id: &str, skip: StepKind) -> Result<StepOutputs> {
        self.db.with_conn(|conn| {
            let mut outputs = StepOutputs::new();
            for step in StepKind::ALL.into_iter().filter(|s| *s != skip) {
                if let Some(version) = VersionStore::current_version_in(conn, job_id, step)? {
                    outputs = outputs.with(version.content);
                }
            }
            Ok(outputs)
        })
    }
}
