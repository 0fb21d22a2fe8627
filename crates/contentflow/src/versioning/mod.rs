//! Immutable per-step content history.
//!
//! Every successful step execution produces a [`ContentVersion`]. Versions
//! are never rewritten; only their status moves between ACTIVE, ARCHIVED and
//! DELETED. For each (job, step) at most one version is ACTIVE, backed by a
//! partial unique index in the schema.

use serde::{Deserialize, Serialize};

use crate::content::StepContent;
use crate::db::version_repo::VersionRow;
use crate::error::EngineError;
use crate::model::{StepKind, TokenUsage, VersionStatus};

pub mod diff;
pub mod store;

pub use diff::{compare, similarity, FieldChange, VersionComparison};
pub use store::VersionStore;

/// Provenance recorded with every version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub generating_user: String,
    pub prompt: String,
    pub model: String,
    /// Provider-reported usage, summed over all calls of the step.
    pub usage: TokenUsage,
    /// Billing tokens debited for this version.
    #[serde(default)]
    pub billed_cost: i64,
    /// The version that was current when this one was generated.
    #[serde(default)]
    pub parent_version_id: Option<String>,
    #[serde(default)]
    pub is_regeneration: bool,
    #[serde(default)]
    pub regeneration_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentVersion {
    pub id: String,
    pub job_id: String,
    pub step: StepKind,
    pub version: i64,
    pub schema_version: i64,
    pub content: StepContent,
    pub metadata: VersionMetadata,
    pub status: VersionStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl ContentVersion {
    pub fn is_active(&self) -> bool {
        self.status == VersionStatus::Active
    }
}

impl TryFrom<VersionRow> for ContentVersion {
    type Error = EngineError;

    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        let content = StepContent::from_json_str(row.step_type, &row.content)?;
        let metadata: VersionMetadata = serde_json::from_str(&row.metadata)?;
        Ok(Self {
            id: row.id,
            job_id: row.job_id,
            step: row.step_type,
            version: row.version,
            schema_version: row.schema_version,
            content,
            metadata,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Versions of one (job, step), newest first.
#[derive(Debug, Clone, Serialize)]
pub struct StepHistory {
    pub job_id: String,
    pub step: StepKind,
    pub versions: Vec<ContentVersion>,
    /// The ACTIVE version, or the most recent one when none is ACTIVE.
    pub current_version: Option<ContentVersion>,
}

impl StepHistory {
    pub(crate) fn new(job_id: &str, step: StepKind, versions: Vec<ContentVersion>) -> Self {
        let current_version = versions
            .iter()
            .find(|v| v.is_active())
            .or_else(|| versions.iter().find(|v| v.status != VersionStatus::Deleted))
            .cloned();
        Self {
            job_id: job_id.to_string(),
            step,
            versions,
            current_version,
        }
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
