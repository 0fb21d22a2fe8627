use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{ImageQuality, StepKind};

/// Posting time used for platforms missing from the lookup table.
pub const DEFAULT_POSTING_TIME: &str = "12:00";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub version: String,
    /// SQLite file; `None` uses `~/.contentflow/data/contentflow.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            pricing: PricingConfig::default(),
            publishing: PublishingConfig::default(),
            models: ModelsConfig::default(),
            assembly: AssemblyConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Fixed per-operation prices in billing tokens.
///
/// Text stages carry a flat charge; the image stage is tiered by quality
/// and charged per rendered variation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_step_prices")]
    pub steps: BTreeMap<StepKind, i64>,
    #[serde(default = "default_image_tiers")]
    pub image_tiers: BTreeMap<ImageQuality, i64>,
    /// Monetary value of one billing token.
    #[serde(default = "default_token_value")]
    pub token_value: f64,
}

fn default_step_prices() -> BTreeMap<StepKind, i64> {
    BTreeMap::from([
        (StepKind::Idea, 10),
        (StepKind::CopyDesign, 15),
        (StepKind::CopyPublication, 15),
        (StepKind::FinalDesign, 25),
    ])
}

fn default_image_tiers() -> BTreeMap<ImageQuality, i64> {
    BTreeMap::from([(ImageQuality::Standard, 40), (ImageQuality::Hd, 80)])
}

fn default_token_value() -> f64 {
    0.01
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            steps: default_step_prices(),
            image_tiers: default_image_tiers(),
            token_value: default_token_value(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// Suggested posting time (`HH:MM`) per upper-case platform name.
    #[serde(default = "default_posting_times")]
    pub posting_times: BTreeMap<String, String>,
    #[serde(default = "default_posting_time")]
    pub default_posting_time: String,
}

fn default_posting_times() -> BTreeMap<String, String> {
    [
        ("INSTAGRAM", "11:00"),
        ("FACEBOOK", "13:00"),
        ("TWITTER", "09:00"),
        ("LINKEDIN", "08:00"),
        ("TIKTOK", "19:00"),
        ("PINTEREST", "20:00"),
    ]
    .into_iter()
    .map(|(platform, time)| (platform.to_string(), time.to_string()))
    .collect()
}

fn default_posting_time() -> String {
    DEFAULT_POSTING_TIME.to_string()
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            posting_times: default_posting_times(),
            default_posting_time: default_posting_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_text_model")]
    pub text: String,
    #[serde(default = "default_image_model")]
    pub image: String,
    /// Per-step text model overrides.
    #[serde(default)]
    pub steps: BTreeMap<StepKind, String>,
}

fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

impl ModelsConfig {
    pub fn text_model_for(&self, step: StepKind) -> &str {
        self.steps.get(&step).map(String::as_str).unwrap_or(&self.text)
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            text: default_text_model(),
            image: default_image_model(),
            steps: BTreeMap::new(),
        }
    }
}

/// Thresholds used by the content assembler's recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Captions longer than this are flagged for mobile.
    #[serde(default = "default_max_caption_length")]
    pub max_caption_length: usize,
    #[serde(default = "default_max_hashtags")]
    pub max_hashtags: usize,
    #[serde(default = "default_max_headline_length")]
    pub max_headline_length: usize,
}

fn default_max_caption_length() -> usize {
    150
}

fn default_max_hashtags() -> usize {
    10
}

fn default_max_headline_length() -> usize {
    60
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_caption_length: default_max_caption_length(),
            max_hashtags: default_max_hashtags(),
            max_headline_length: default_max_headline_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_image_variations")]
    pub max_image_variations: u32,
}

fn default_max_image_variations() -> u32 {
    4
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_variations: default_max_image_variations(),
        }
    }
}
