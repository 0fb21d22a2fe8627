//! Generation provider contract.
//!
//! The engine never talks to an AI SDK directly. Text stages call a
//! [`TextProvider`]; the image stage calls the text provider for an image
//! prompt and then an [`ImageProvider`] to render it. Calls block until the
//! provider returns; timeouts are the provider's business.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::content::ImageAsset;
use crate::model::{ImageQuality, StepKind, TokenUsage};

pub mod mock;

pub use mock::{MockImageProvider, MockTextProvider};

/// Everything a text provider needs to generate one step.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub step: StepKind,
    pub model: String,
    pub system_prompt: String,
    pub prompt: String,
    /// Payloads of every earlier step in this run, keyed by step.
    pub previous_outputs: BTreeMap<StepKind, Value>,
}

/// Result of a text generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    pub content: Value,
    pub usage: TokenUsage,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: String,
    pub quality: ImageQuality,
    pub variations: u32,
}

/// Result of an image render call.
#[derive(Debug, Clone)]
pub struct ImageGeneration {
    pub images: Vec<ImageAsset>,
    pub usage: TokenUsage,
    pub model: String,
}

/// Why a provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFailure {
    QuotaExceeded,
    SafetyBlocked,
    NetworkError,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderFailure::QuotaExceeded => "quota_exceeded",
            ProviderFailure::SafetyBlocked => "safety_blocked",
            ProviderFailure::NetworkError => "network_error",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("quota_exceeded: {0}")]
    QuotaExceeded(String),

    #[error("safety_blocked: {0}")]
    SafetyBlocked(String),

    #[error("network_error: {0}")]
    Network(String),
}

impl ProviderError {
    pub fn failure(&self) -> ProviderFailure {
        match self {
            ProviderError::QuotaExceeded(_) => ProviderFailure::QuotaExceeded,
            ProviderError::SafetyBlocked(_) => ProviderFailure::SafetyBlocked,
            ProviderError::Network(_) => ProviderFailure::NetworkError,
        }
    }
}

pub trait TextProvider: Send + Sync {
    fn generate(&self, step: StepKind, prompt: &PromptContext) -> Result<Generation, ProviderError>;
}

pub trait ImageProvider: Send + Sync {
    fn render(&self, request: &ImageRequest) -> Result<ImageGeneration, ProviderError>;
}

/// The provider pair the engine dispatches to.
#[derive(Clone)]
pub struct Providers {
    pub text: Arc<dyn TextProvider>,
    pub image: Arc<dyn ImageProvider>,
}

impl Providers {
    pub fn new(text: Arc<dyn TextProvider>, image: Arc<dyn ImageProvider>) -> Self {
        Self { text, image }
    }
}
