//! Builders for test requests and configuration.

#![allow(dead_code)]

use contentflow::config::EngineConfig;
use contentflow::model::{ImageQuality, StepKind};
use contentflow::workflow::{WorkflowContext, WorkflowOptions};

pub const AGENCY: &str = "agency-1";

/// Builder for `WorkflowContext` requests.
pub struct ContextBuilder {
    context: WorkflowContext,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            context: WorkflowContext {
                job_id: None,
                campaign_id: "campaign-1".to_string(),
                client_id: "client-1".to_string(),
                agency_id: AGENCY.to_string(),
                user_id: "user-1".to_string(),
                brand_name: "Sunbrew".to_string(),
                brand_description: Some("Cold brew coffee in a can".to_string()),
                brand_voice: Some("playful".to_string()),
                target_audience: Some("urban commuters".to_string()),
                campaign_name: "Summer launch".to_string(),
                campaign_objective: Some("awareness".to_string()),
                campaign_description: None,
                platforms: vec!["INSTAGRAM".to_string()],
                options: WorkflowOptions::default(),
            },
        }
    }

    pub fn agency(mut self, agency_id: &str) -> Self {
        self.context.agency_id = agency_id.to_string();
        self
    }

    pub fn job_id(mut self, job_id: &str) -> Self {
        self.context.job_id = Some(job_id.to_string());
        self
    }

    pub fn platforms(mut self, platforms: &[&str]) -> Self {
        self.context.platforms = platforms.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn skip(mut self, step: StepKind) -> Self {
        self.context.options.skip_steps.insert(step);
        self
    }

    pub fn images(mut self, variations: u32, quality: ImageQuality) -> Self {
        self.context.options.image_variations = variations;
        self.context.options.image_quality = quality;
        self
    }

    pub fn regenerate(mut self, step: StepKind, reason: &str) -> Self {
        self.context.options.regenerate_step = Some(step);
        self.context.options.regeneration_reason = Some(reason.to_string());
        self
    }

    pub fn build(self) -> WorkflowContext {
        self.context
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `EngineConfig` with deterministic prices.
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn step_price(mut self, step: StepKind, price: i64) -> Self {
        self.config.pricing.steps.insert(step, price);
        self
    }

    pub fn image_tier(mut self, quality: ImageQuality, price: i64) -> Self {
        self.config.pricing.image_tiers.insert(quality, price);
        self
    }

    pub fn posting_time(mut self, platform: &str, time: &str) -> Self {
        self.config
            .publishing
            .posting_times
            .insert(platform.to_string(), time.to_string());
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub const TEXT_STEPS: &[StepKind] = &[StepKind::Idea, StepKind::CopyDesign];

pub const ALL_STEPS: &[StepKind] = &StepKind::ALL;
