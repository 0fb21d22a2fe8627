use serde::Serialize;

use crate::assembler::FinalBundle;
use crate::error::EngineError;
use crate::model::{JobStatus, StepKind, StepStatus, StepUsage};
use crate::versioning::ContentVersion;

/// Outcome of one step execution.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub job_id: String,
    pub step: StepKind,
    pub status: StepStatus,
    /// The version created by this execution; `None` when it failed.
    pub version: Option<ContentVersion>,
    pub usage: StepUsage,
    pub duration_ms: i64,
    pub error: Option<String>,
}

impl StepResult {
    pub(crate) fn completed(
        job_id: &str,
        version: ContentVersion,
        usage: StepUsage,
        duration_ms: i64,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            step: version.step,
            status: StepStatus::Completed,
            version: Some(version),
            usage,
            duration_ms,
            error: None,
        }
    }

    pub(crate) fn failed(job_id: &str, step: StepKind, error: &EngineError) -> Self {
        Self {
            job_id: job_id.to_string(),
            step,
            status: StepStatus::Failed,
            version: None,
            usage: StepUsage::default(),
            duration_ms: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Outcome of a whole run. A failed step shows up here as
/// `status == FAILED` with `error` naming the step, not as an `Err`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub job_id: String,
    pub status: JobStatus,
    /// Steps that were attempted, in execution order.
    pub steps: Vec<StepResult>,
    pub total_cost: i64,
    pub total_tokens: i64,
    pub final_content: Option<FinalBundle>,
    pub error: Option<String>,
}

impl WorkflowResult {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn step(&self, step: StepKind) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == step)
    }
}
