//! Typed payloads produced by each pipeline step.
//!
//! Every payload is stored as JSON next to [`SCHEMA_VERSION`]. Providers
//! return loosely-typed JSON; [`StepContent::from_json`] turns it into the
//! schema of the requested step and [`StepContent::validate`] rejects
//! payloads that parse but are unusable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::model::{ImageQuality, StepKind};

/// Schema version written with every content version.
pub const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaContent {
    pub title: String,
    pub concept: String,
    #[serde(default)]
    pub key_messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_emotion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyDesignContent {
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheadline: Option<String>,
    pub call_to_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyPublicationContent {
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseImageContent {
    pub image_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub quality: ImageQuality,
    pub images: Vec<ImageAsset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDesignContent {
    pub layout: String,
    #[serde(default)]
    pub text_overlays: Vec<TextOverlay>,
    #[serde(default)]
    pub color_palette: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// The output of one step. Serializes to the bare payload object; the step
/// kind travels alongside it (column or map key), never inside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepContent {
    Idea(IdeaContent),
    CopyDesign(CopyDesignContent),
    CopyPublication(CopyPublicationContent),
    BaseImage(BaseImageContent),
    FinalDesign(FinalDesignContent),
}

impl StepContent {
    pub fn kind(&self) -> StepKind {
        match self {
            StepContent::Idea(_) => StepKind::Idea,
            StepContent::CopyDesign(_) => StepKind::CopyDesign,
            StepContent::CopyPublication(_) => StepKind::CopyPublication,
            StepContent::BaseImage(_) => StepKind::BaseImage,
            StepContent::FinalDesign(_) => StepKind::FinalDesign,
        }
    }

    /// Parses a payload against the schema of `kind`.
    pub fn from_json(kind: StepKind, value: Value) -> Result<Self, EngineError> {
        let parsed = match kind {
            StepKind::Idea => serde_json::from_value(value).map(StepContent::Idea),
            StepKind::CopyDesign => serde_json::from_value(value).map(StepContent::CopyDesign),
            StepKind::CopyPublication => {
                serde_json::from_value(value).map(StepContent::CopyPublication)
            }
            StepKind::BaseImage => serde_json::from_value(value).map(StepContent::BaseImage),
            StepKind::FinalDesign => serde_json::from_value(value).map(StepContent::FinalDesign),
        };
        parsed.map_err(|e| {
            EngineError::validation(format!("{} payload does not match its schema: {}", kind, e))
        })
    }

    /// Parses a payload stored as JSON text.
    pub fn from_json_str(kind: StepKind, text: &str) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(kind, value)
    }

    pub fn to_json(&self) -> Result<Value, EngineError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Top-level payload fields, used for version comparison.
    pub fn fields(&self) -> Result<Map<String, Value>, EngineError> {
        match self.to_json()? {
            Value::Object(map) => Ok(map),
            other => Err(EngineError::validation(format!(
                "{} payload is not an object: {}",
                self.kind(),
                other
            ))),
        }
    }

    /// Rejects payloads that parse but miss required content.
    pub fn validate(&self) -> Result<(), EngineError> {
        let kind = self.kind();
        let require = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(EngineError::validation(format!(
                    "{} payload has an empty '{}'",
                    kind, field
                )))
            } else {
                Ok(())
            }
        };

        match self {
            StepContent::Idea(idea) => {
                require("title", &idea.title)?;
                require("concept", &idea.concept)
            }
            StepContent::CopyDesign(copy) => {
                require("headline", &copy.headline)?;
                require("call_to_action", &copy.call_to_action)
            }
            StepContent::CopyPublication(copy) => require("caption", &copy.caption),
            StepContent::BaseImage(image) => {
                require("image_prompt", &image.image_prompt)?;
                if image.images.is_empty() {
                    return Err(EngineError::validation(
                        "BASE_IMAGE payload contains no images",
                    ));
                }
                image
                    .images
                    .iter()
                    .try_for_each(|asset| require("images[].url", &asset.url))
            }
            StepContent::FinalDesign(design) => require("layout", &design.layout),
        }
    }

    /// A short plain-text rendering used when later prompts quote earlier steps.
    pub fn summary(&self) -> String {
        match self {
            StepContent::Idea(idea) => {
                let mut out = format!("{}: {}", idea.title, idea.concept);
                if !idea.key_messages.is_empty() {
                    out.push_str(&format!(" (key messages: {})", idea.key_messages.join("; ")));
                }
                out
            }
            StepContent::CopyDesign(copy) => match &copy.subheadline {
                Some(sub) => format!("{} / {} / CTA: {}", copy.headline, sub, copy.call_to_action),
                None => format!("{} / CTA: {}", copy.headline, copy.call_to_action),
            },
            StepContent::CopyPublication(copy) => {
                if copy.hashtags.is_empty() {
                    copy.caption.clone()
                } else {
                    format!("{} {}", copy.caption, copy.hashtags.join(" "))
                }
            }
            StepContent::BaseImage(image) => format!(
                "{} image(s) from prompt: {}",
                image.images.len(),
                image.image_prompt
            ),
            StepContent::FinalDesign(design) => format!("layout: {}", design.layout),
        }
    }
}
