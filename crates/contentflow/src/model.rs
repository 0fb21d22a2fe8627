//! Core domain enums and usage types shared by every layer.
//!
//! Enums are stored as SCREAMING_SNAKE strings in SQLite and serialized the
//! same way over serde, so a status read from a row and one read from JSON
//! always agree.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored or submitted string does not name a known variant.
#[derive(Debug, Clone, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

/// One stage of the generation pipeline. The set is closed: provider
/// dispatch, prompt templates and pricing all match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Idea,
    CopyDesign,
    CopyPublication,
    BaseImage,
    FinalDesign,
}

string_enum!(StepKind, "step kind", {
    Idea => "IDEA",
    CopyDesign => "COPY_DESIGN",
    CopyPublication => "COPY_PUBLICATION",
    BaseImage => "BASE_IMAGE",
    FinalDesign => "FINAL_DESIGN",
});

impl StepKind {
    /// Canonical pipeline order.
    pub const ALL: [StepKind; 5] = [
        StepKind::Idea,
        StepKind::CopyDesign,
        StepKind::CopyPublication,
        StepKind::BaseImage,
        StepKind::FinalDesign,
    ];

    /// Whether the stage renders images (two provider calls) rather than text.
    pub fn is_image(&self) -> bool {
        matches!(self, StepKind::BaseImage)
    }
}

/// Lifecycle of a job. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

string_enum!(JobStatus, "job status", {
    Pending => "PENDING",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// PENDING may fail before it ever starts; terminal states never move.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }
}

/// Status of the current execution of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

string_enum!(StepStatus, "step status", {
    Pending => "PENDING",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    Active,
    Archived,
    Deleted,
}

string_enum!(VersionStatus, "version status", {
    Active => "ACTIVE",
    Archived => "ARCHIVED",
    Deleted => "DELETED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    /// Prepaid tokens bought by the agency.
    Purchase,
    /// Charge for a successful generation.
    Usage,
    Refund,
    Adjustment,
}

string_enum!(LedgerEntryType, "ledger entry type", {
    Purchase => "PURCHASE",
    Usage => "USAGE",
    Refund => "REFUND",
    Adjustment => "ADJUSTMENT",
});

/// Render quality for the image stage; selects the pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

string_enum!(ImageQuality, "image quality", {
    Standard => "STANDARD",
    Hd => "HD",
});

/// Token usage as reported by a generation provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Provider-side monetary cost, informational only.
    pub cost: f64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, cost: f64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost,
        }
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
            cost: self.cost + rhs.cost,
        }
    }
}

/// What a step execution consumed: provider tokens and billed cost
/// (in billing tokens, as priced by the cost meter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepUsage {
    pub tokens: i64,
    pub cost: i64,
}

impl AddAssign for StepUsage {
    fn add_assign(&mut self, rhs: StepUsage) {
        self.tokens += rhs.tokens;
        self.cost += rhs.cost;
    }
}
