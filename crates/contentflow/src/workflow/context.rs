use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LimitsConfig;
use crate::content::{
    BaseImageContent, CopyDesignContent, CopyPublicationContent, FinalDesignContent,
    IdeaContent, StepContent,
};
use crate::error::{EngineError, Result};
use crate::model::{ImageQuality, StepKind};

/// A content request: who asks, for which brand and campaign, and how.
///
/// Stored verbatim on the job so a later regeneration sees the same brief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Set when the request targets an existing job (regeneration).
    #[serde(default)]
    pub job_id: Option<String>,
    pub campaign_id: String,
    pub client_id: String,
    pub agency_id: String,
    pub user_id: String,

    pub brand_name: String,
    #[serde(default)]
    pub brand_description: Option<String>,
    #[serde(default)]
    pub brand_voice: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,

    pub campaign_name: String,
    #[serde(default)]
    pub campaign_objective: Option<String>,
    #[serde(default)]
    pub campaign_description: Option<String>,

    /// Target platforms, e.g. `INSTAGRAM`. Matched case-insensitively.
    #[serde(default)]
    pub platforms: Vec<String>,

    #[serde(default)]
    pub options: WorkflowOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    #[serde(default)]
    pub regenerate_step: Option<StepKind>,
    /// Recorded on the new version when `regenerate_step` is honoured.
    #[serde(default)]
    pub regeneration_reason: Option<String>,
    /// Replaces the built-in stage instruction of a step.
    #[serde(default)]
    pub custom_prompts: BTreeMap<StepKind, String>,
    #[serde(default = "default_image_variations")]
    pub image_variations: u32,
    #[serde(default)]
    pub image_quality: ImageQuality,
    #[serde(default)]
    pub skip_steps: BTreeSet<StepKind>,
    /// Appended to every prompt of the run.
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

fn default_image_variations() -> u32 {
    1
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            regenerate_step: None,
            regeneration_reason: None,
            custom_prompts: BTreeMap::new(),
            image_variations: default_image_variations(),
            image_quality: ImageQuality::default(),
            skip_steps: BTreeSet::new(),
            custom_instructions: None,
        }
    }
}

impl WorkflowContext {
    /// Rejects requests the pipeline cannot run. Nothing has been persisted
    /// when this fails.
    pub fn validate(&self, limits: &LimitsConfig) -> Result<()> {
        let required = [
            ("campaign_id", &self.campaign_id),
            ("client_id", &self.client_id),
            ("agency_id", &self.agency_id),
            ("user_id", &self.user_id),
            ("brand_name", &self.brand_name),
            ("campaign_name", &self.campaign_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(EngineError::validation(format!("'{}' is required", field)));
            }
        }

        if let Some(platform) = self.platforms.iter().find(|p| p.trim().is_empty()) {
            return Err(EngineError::validation(format!(
                "Invalid platform name '{}'",
                platform
            )));
        }

        let variations = self.options.image_variations;
        if variations == 0 || variations > limits.max_image_variations {
            return Err(EngineError::validation(format!(
                "image_variations must be between 1 and {}, got {}",
                limits.max_image_variations, variations
            )));
        }

        if let Some((step, _)) = self
            .options
            .custom_prompts
            .iter()
            .find(|(_, prompt)| prompt.trim().is_empty())
        {
            return Err(EngineError::validation(format!(
                "Custom prompt for {} is empty",
                step
            )));
        }

        Ok(())
    }

    pub fn is_skipped(&self, step: StepKind) -> bool {
        self.options.skip_steps.contains(&step)
    }
}

/// Outputs of the steps that ran so far, keyed by step.
///
/// The value is never mutated in place: [`StepOutputs::with`] returns a new
/// set, so every step sees exactly the outputs that existed when it started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutputs {
    outputs: BTreeMap<StepKind, StepContent>,
}

impl StepOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(&self, content: StepContent) -> Self {
        let mut outputs = self.outputs.clone();
        outputs.insert(content.kind(), content);
        Self { outputs }
    }

    pub fn get(&self, step: StepKind) -> Option<&StepContent> {
        self.outputs.get(&step)
    }

    pub fn contains(&self, step: StepKind) -> bool {
        self.outputs.contains_key(&step)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Outputs in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (StepKind, &StepContent)> {
        self.outputs.iter().map(|(k, v)| (*k, v))
    }

    pub fn to_json_map(&self) -> Result<BTreeMap<StepKind, Value>> {
        self.outputs
            .iter()
            .map(|(kind, content)| Ok((*kind, content.to_json()?)))
            .collect()
    }

    pub fn idea(&self) -> Option<&IdeaContent> {
        match self.get(StepKind::Idea) {
            Some(StepContent::Idea(idea)) => Some(idea),
            _ => None,
        }
    }

    pub fn copy_design(&self) -> Option<&CopyDesignContent> {
        match self.get(StepKind::CopyDesign) {
            Some(StepContent::CopyDesign(copy)) => Some(copy),
            _ => None,
        }
    }

    pub fn copy_publication(&self) -> Option<&CopyPublicationContent> {
        match self.get(StepKind::CopyPublication) {
            Some(StepContent::CopyPublication(copy)) => Some(copy),
            _ => None,
        }
    }

    pub fn base_image(&self) -> Option<&BaseImageContent> {
        match self.get(StepKind::BaseImage) {
            Some(StepContent::BaseImage(image)) => Some(image),
            _ => None,
        }
    }

    pub fn final_design(&self) -> Option<&FinalDesignContent> {
        match self.get(StepKind::FinalDesign) {
            Some(StepContent::FinalDesign(design)) => Some(design),
            _ => None,
        }
    }
}
