//! Field-level comparison of two versions of the same step.
//!
//! Similarity is the mean of per-field scores over the union of top-level
//! payload keys:
//! - both sides strings: `1 - levenshtein(a, b) / max(len(a), len(b))`
//! - any other pair of values: 1 when equal, 0 otherwise
//! - key present on one side only: 0
//!
//! An empty key set scores 1.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};
use crate::model::StepKind;

use super::ContentVersion;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum FieldChange {
    Added {
        field: String,
        value: Value,
    },
    Removed {
        field: String,
        value: Value,
    },
    Modified {
        field: String,
        before: Value,
        after: Value,
    },
}

impl FieldChange {
    pub fn field(&self) -> &str {
        match self {
            FieldChange::Added { field, .. }
            | FieldChange::Removed { field, .. }
            | FieldChange::Modified { field, .. } => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionComparison {
    pub step: StepKind,
    pub from_version: i64,
    pub to_version: i64,
    /// Changes going from the first version to the second, ordered by field.
    pub changes: Vec<FieldChange>,
    /// In `[0, 1]`; 1 means identical payloads.
    pub similarity: f64,
}

impl VersionComparison {
    pub fn is_identical(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compares two versions of the same step. Versions of different steps
/// have different schemas and are rejected.
pub fn compare(from: &ContentVersion, to: &ContentVersion) -> Result<VersionComparison> {
    if from.step != to.step {
        return Err(EngineError::validation(format!(
            "Cannot compare a {} version with a {} version",
            from.step, to.step
        )));
    }

    let before = from.content.fields()?;
    let after = to.content.fields()?;

    Ok(VersionComparison {
        step: from.step,
        from_version: from.version,
        to_version: to.version,
        changes: changes(&before, &after),
        similarity: similarity(&before, &after),
    })
}

fn changes(before: &Map<String, Value>, after: &Map<String, Value>) -> Vec<FieldChange> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter_map(|key| match (before.get(key), after.get(key)) {
            (None, Some(value)) => Some(FieldChange::Added {
                field: key.clone(),
                value: value.clone(),
            }),
            (Some(value), None) => Some(FieldChange::Removed {
                field: key.clone(),
                value: value.clone(),
            }),
            (Some(a), Some(b)) if a != b => Some(FieldChange::Modified {
                field: key.clone(),
                before: a.clone(),
                after: b.clone(),
            }),
            _ => None,
        })
        .collect()
}

pub fn similarity(before: &Map<String, Value>, after: &Map<String, Value>) -> f64 {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    if keys.is_empty() {
        return 1.0;
    }

    let total: f64 = keys
        .iter()
        .map(|key| match (before.get(*key), after.get(*key)) {
            (Some(Value::String(a)), Some(Value::String(b))) => string_similarity(a, b),
            (Some(a), Some(b)) if a == b => 1.0,
            _ => 0.0,
        })
        .sum();
    total / keys.len() as f64
}

fn string_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

/// Edit distance over chars, two rows at a time.
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}
