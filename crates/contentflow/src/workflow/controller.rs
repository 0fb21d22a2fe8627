use std::collections::BTreeSet;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::{error, info, info_span, warn};

use crate::assembler::ContentAssembler;
use crate::config::EngineConfig;
use crate::db::audit_repo::{self, events};
use crate::db::job_repo::{self, JobRow};
use crate::db::{now_timestamp, step_repo, Database};
use crate::error::{EngineError, Result};
use crate::model::{JobStatus, StepKind, StepUsage};

use super::context::{StepOutputs, WorkflowContext};
use super::executor::{StepExecutor, StepRequest};
use super::progress::{ProgressEvent, ProgressReporter};
use super::result::{StepResult, WorkflowResult};

/// Drives a job through its steps, in order, stopping at the first failure.
///
/// Steps that completed before a failure keep their versions and debits.
#[derive(Clone)]
pub struct JobController {
    db: Database,
    config: Arc<EngineConfig>,
    executor: StepExecutor,
    assembler: ContentAssembler,
}

impl JobController {
    pub fn new(
        db: Database,
        config: Arc<EngineConfig>,
        executor: StepExecutor,
        assembler: ContentAssembler,
    ) -> Self {
        Self {
            db,
            config,
            executor,
            assembler,
        }
    }

    /// Runs `steps` for a new job.
    ///
    /// Returns `Err` only when the request is invalid (nothing persisted) or
    /// the job's own bookkeeping cannot be written. A failing step yields
    /// `Ok` with `status == FAILED`.
    pub fn execute_workflow(
        &self,
        context: &WorkflowContext,
        steps: &[StepKind],
        progress: &dyn ProgressReporter,
    ) -> Result<WorkflowResult> {
        context.validate(&self.config.limits)?;
        validate_steps(steps)?;

        let job_id = self.submit(context, steps)?;
        let _span = info_span!("workflow", %job_id).entered();

        match self.run(&job_id, context, steps, progress) {
            Ok(result) => Ok(result),
            Err(err) => {
                self.abandon(&job_id, &err, progress);
                Err(err)
            }
        }
    }

    fn run(
        &self,
        job_id: &str,
        context: &WorkflowContext,
        steps: &[StepKind],
        progress: &dyn ProgressReporter,
    ) -> Result<WorkflowResult> {
        let job_id = job_id.to_string();
        info!(steps = steps.len(), "Workflow started");
        progress.report(ProgressEvent::JobStarted {
            job_id: job_id.clone(),
            steps: steps.to_vec(),
        });

        let mut outputs = StepOutputs::new();
        let mut totals = StepUsage::default();
        let mut results = Vec::with_capacity(steps.len());

        for &step in steps {
            if context.is_skipped(step) {
                info!(%step, "Skipping step");
                continue;
            }

            let request = StepRequest {
                job_id: &job_id,
                step,
                context,
                outputs: &outputs,
                regeneration_reason: None,
            };
            match self.executor.execute_step(&request, progress) {
                Ok(result) => {
                    totals += result.usage;
                    if let Some(version) = &result.version {
                        outputs = outputs.with(version.content.clone());
                    }
                    results.push(result);
                }
                Err(err) => {
                    let message = EngineError::step_failure_message(step, &err);
                    warn!(error = %message, "Workflow failed");
                    self.db.with_tx(|tx| {
                        let now = now_timestamp();
                        transition(tx, &job_id, JobStatus::Failed, Some(&message), &now)?;
                        audit_repo::record(tx, &job_id, None, events::JOB_FAILED, &message, &now)?;
                        Ok::<_, EngineError>(())
                    })?;
                    progress.report(ProgressEvent::JobFailed {
                        job_id: job_id.clone(),
                        error: message.clone(),
                    });
                    results.push(StepResult::failed(&job_id, step, &err));

                    return Ok(WorkflowResult {
                        job_id,
                        status: JobStatus::Failed,
                        steps: results,
                        total_cost: totals.cost,
                        total_tokens: totals.tokens,
                        final_content: None,
                        error: Some(message),
                    });
                }
            }
        }

        let bundle = self.assembler.assemble(&job_id, context, &outputs);
        let bundle_json = serde_json::to_string(&bundle)?;
        self.db.with_tx(|tx| {
            let now = now_timestamp();
            job_repo::set_final_content(tx, &job_id, &bundle_json, &now)?;
            transition(tx, &job_id, JobStatus::Completed, None, &now)?;
            audit_repo::record(
                tx,
                &job_id,
                None,
                events::JOB_COMPLETED,
                &format!("cost {} tokens {}", totals.cost, totals.tokens),
                &now,
            )?;
            Ok::<_, EngineError>(())
        })?;

        info!(
            total_cost = totals.cost,
            total_tokens = totals.tokens,
            "Workflow completed"
        );
        progress.report(ProgressEvent::JobCompleted {
            job_id: job_id.clone(),
            total_cost: totals.cost,
            total_tokens: totals.tokens,
        });

        Ok(WorkflowResult {
            job_id,
            status: JobStatus::Completed,
            steps: results,
            total_cost: totals.cost,
            total_tokens: totals.tokens,
            final_content: Some(bundle),
            error: None,
        })
    }

    /// Marks a job FAILED after its own bookkeeping broke mid-run, so it
    /// does not stay IN_PROGRESS. Errors here are logged, not returned.
    fn abandon(&self, job_id: &str, cause: &EngineError, progress: &dyn ProgressReporter) {
        let message = format!("Workflow aborted: {}", cause);
        let outcome = self.db.with_tx(|tx| {
            if load_job(tx, job_id)?.status.is_terminal() {
                return Ok(false);
            }
            let now = now_timestamp();
            transition(tx, job_id, JobStatus::Failed, Some(&message), &now)?;
            audit_repo::record(tx, job_id, None, events::JOB_FAILED, &message, &now)?;
            Ok::<_, EngineError>(true)
        });
        match outcome {
            Ok(true) => {
                warn!(error = %message, "Job marked failed");
                progress.report(ProgressEvent::JobFailed {
                    job_id: job_id.to_string(),
                    error: message,
                });
            }
            Ok(false) => {}
            Err(err) => error!(error = %err, "Could not mark job failed"),
        }
    }

    /// Inserts the job and its PENDING step rows and moves it IN_PROGRESS.
    fn submit(&self, context: &WorkflowContext, steps: &[StepKind]) -> Result<String> {
        let job_id = context
            .job_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut stored = context.clone();
        stored.job_id = Some(job_id.clone());
        stored.options.regenerate_step = None;
        stored.options.regeneration_reason = None;
        let context_json = serde_json::to_string(&stored)?;

        self.db.with_tx(|tx| {
            if job_repo::find_by_id(tx, &job_id)?.is_some() {
                return Err(EngineError::validation(format!(
                    "Job {} already exists",
                    job_id
                )));
            }

            let now = now_timestamp();
            job_repo::insert(
                tx,
                &JobRow {
                    id: job_id.clone(),
                    campaign_id: context.campaign_id.clone(),
                    client_id: context.client_id.clone(),
                    agency_id: context.agency_id.clone(),
                    user_id: context.user_id.clone(),
                    status: JobStatus::Pending,
                    total_cost: 0,
                    total_tokens: 0,
                    error: None,
                    context: context_json,
                    final_content: None,
                    created_at: now.clone(),
                    updated_at: now.clone(),
                    completed_at: None,
                },
            )?;
            audit_repo::record(
                tx,
                &job_id,
                None,
                events::JOB_SUBMITTED,
                &format!("agency {}", context.agency_id),
                &now,
            )?;

            let scheduled = steps.iter().filter(|step| !context.is_skipped(**step));
            for (position, step) in scheduled.enumerate() {
                step_repo::insert_pending(tx, &job_id, *step, position as i64, &now)?;
            }

            transition(tx, &job_id, JobStatus::InProgress, None, &now)?;
            Ok(job_id.clone())
        })
    }
}

fn validate_steps(steps: &[StepKind]) -> Result<()> {
    if steps.is_empty() {
        return Err(EngineError::validation("At least one step is required"));
    }
    let mut seen = BTreeSet::new();
    for step in steps {
        if !seen.insert(*step) {
            return Err(EngineError::validation(format!(
                "Step {} is listed more than once",
                step
            )));
        }
    }
    Ok(())
}

fn load_job(conn: &Connection, job_id: &str) -> Result<JobRow> {
    job_repo::find_by_id(conn, job_id)?.ok_or_else(|| EngineError::not_found("job", job_id))
}

/// Moves a job to `next`, refusing backwards or out-of-order moves.
fn transition(
    conn: &Connection,
    job_id: &str,
    next: JobStatus,
    error: Option<&str>,
    now: &str,
) -> Result<()> {
    let job = load_job(conn, job_id)?;
    if !job.status.can_transition_to(next) {
        return Err(EngineError::OperationNotAllowed(format!(
            "job {} cannot move from {} to {}",
            job_id, job.status, next
        )));
    }
    job_repo::update_status(conn, job_id, next, error, now)?;
    Ok(())
}

pub(crate) fn find_job(db: &Database, job_id: &str) -> Result<JobRow> {
    db.with_conn(|conn| load_job(conn, job_id))
}
