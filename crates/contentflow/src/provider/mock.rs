//! Deterministic providers for tests and local runs.
//!
//! Content is canned per step kind and numbered per call, so two
//! generations of the same step are distinguishable. Failures can be
//! armed per step and disarmed again between calls.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::{json, Value};

use crate::content::ImageAsset;
use crate::model::{ImageQuality, StepKind, TokenUsage};

use super::{
    Generation, ImageGeneration, ImageProvider, ImageRequest, PromptContext, ProviderError,
    TextProvider,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct MockTextProvider {
    model: String,
    usage: TokenUsage,
    content: HashMap<StepKind, Value>,
    failures: Mutex<HashMap<StepKind, ProviderError>>,
    calls: Mutex<Vec<PromptContext>>,
}

impl MockTextProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-text-1".to_string(),
            usage: TokenUsage::new(100, 50, 0.001),
            content: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Usage reported by every call.
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64, cost: f64) -> Self {
        self.usage = TokenUsage::new(prompt_tokens, completion_tokens, cost);
        self
    }

    /// Replace the canned payload for one step.
    pub fn with_content(mut self, step: StepKind, content: Value) -> Self {
        self.content.insert(step, content);
        self
    }

    pub fn failing_on(self, step: StepKind, error: ProviderError) -> Self {
        self.fail_on(step, error);
        self
    }

    /// Arms a failure for every later call of `step`.
    pub fn fail_on(&self, step: StepKind, error: ProviderError) {
        lock(&self.failures).insert(step, error);
    }

    pub fn clear_failure(&self, step: StepKind) {
        lock(&self.failures).remove(&step);
    }

    /// Prompts received so far, in call order.
    pub fn calls(&self) -> Vec<PromptContext> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, step: StepKind) -> usize {
        lock(&self.calls).iter().filter(|c| c.step == step).count()
    }

    fn canned(step: StepKind, n: usize) -> Value {
        match step {
            StepKind::Idea => json!({
                "title": format!("Campaign idea #{}", n),
                "concept": "Turn everyday moments into shareable stories",
                "key_messages": ["authentic", "local", "seasonal"],
                "target_emotion": "joy"
            }),
            StepKind::CopyDesign => json!({
                "headline": format!("Make it yours #{}", n),
                "subheadline": "Crafted for the season",
                "call_to_action": "Shop now"
            }),
            StepKind::CopyPublication => json!({
                "caption": format!("Sunny days ahead with our new collection (take {})", n),
                "hashtags": ["#summer", "#newcollection"],
                "call_to_action": "Tap the link in bio"
            }),
            StepKind::BaseImage => json!({
                "image_prompt": format!("Bright product shot on a sandy beach, variant {}", n),
                "alt_text": "Product resting on sand in warm sunlight"
            }),
            StepKind::FinalDesign => json!({
                "layout": format!("hero-image-top-v{}", n),
                "text_overlays": [{"text": "Make it yours", "position": "bottom-center"}],
                "color_palette": ["#FFD166", "#118AB2"]
            }),
        }
    }
}

impl Default for MockTextProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TextProvider for MockTextProvider {
    fn generate(&self, step: StepKind, prompt: &PromptContext) -> Result<Generation, ProviderError> {
        let n = {
            let mut calls = lock(&self.calls);
            calls.push(prompt.clone());
            calls.iter().filter(|c| c.step == step).count()
        };

        if let Some(error) = lock(&self.failures).get(&step) {
            return Err(error.clone());
        }

        let content = self
            .content
            .get(&step)
            .cloned()
            .unwrap_or_else(|| Self::canned(step, n));

        Ok(Generation {
            content,
            usage: self.usage,
            model: self.model.clone(),
        })
    }
}

pub struct MockImageProvider {
    model: String,
    usage: TokenUsage,
    failure: Mutex<Option<ProviderError>>,
    requests: Mutex<Vec<ImageRequest>>,
}

impl MockImageProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-image-1".to_string(),
            usage: TokenUsage::new(0, 0, 0.04),
            failure: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64, cost: f64) -> Self {
        self.usage = TokenUsage::new(prompt_tokens, completion_tokens, cost);
        self
    }

    pub fn fail_with(&self, error: ProviderError) {
        *lock(&self.failure) = Some(error);
    }

    pub fn clear_failure(&self) {
        *lock(&self.failure) = None;
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        lock(&self.requests).clone()
    }
}

impl Default for MockImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProvider for MockImageProvider {
    fn render(&self, request: &ImageRequest) -> Result<ImageGeneration, ProviderError> {
        let batch = {
            let mut requests = lock(&self.requests);
            requests.push(request.clone());
            requests.len()
        };

        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }

        let (width, height) = match request.quality {
            ImageQuality::Standard => (1024, 1024),
            ImageQuality::Hd => (1792, 1792),
        };
        let images = (1..=request.variations)
            .map(|i| ImageAsset {
                url: format!("mock://images/{}/{}.png", batch, i),
                width,
                height,
            })
            .collect();

        Ok(ImageGeneration {
            images,
            usage: self.usage,
            model: self.model.clone(),
        })
    }
}
