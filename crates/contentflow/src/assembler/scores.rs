//! Heuristic quality scores and threshold recommendations.
//!
//! Scores are fixed formulas over the assembled content, each in 0..=100:
//!
//! | score | formula |
//! |---|---|
//! | brand_compliance | 40, +40 if the brand name appears in the idea or copy, +20 if the idea has key messages |
//! | content_quality | 20 per completed step (five steps) |
//! | platform_fit | 100, -30 caption over limit, -20 too many hashtags, -20 headline over limit, -30 no platform |
//! | accessibility | 70 without an image, 100 with image and alt text, 40 with image and no alt text |
//! | estimated_engagement | 30, +10 per hashtag up to 3, +25 with a call to action, +15 with a target emotion |
//!
//! `overall` is the rounded mean of the five.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::AssemblyConfig;
use crate::workflow::{StepOutputs, WorkflowContext};

static RE_HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScores {
    pub brand_compliance: u8,
    pub content_quality: u8,
    pub platform_fit: u8,
    pub accessibility: u8,
    pub estimated_engagement: u8,
    pub overall: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ShortenCaption,
    ReduceHashtags,
    ShortenHeadline,
    AddCallToAction,
    AddAltText,
    AddImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
}

/// What the formulas look at.
#[derive(Debug, Default)]
struct Signals {
    brand_mentioned: bool,
    has_key_messages: bool,
    completed_steps: usize,
    has_platforms: bool,
    caption_chars: usize,
    headline_chars: usize,
    hashtags: usize,
    has_call_to_action: bool,
    has_target_emotion: bool,
    has_image: bool,
    has_alt_text: bool,
}

impl Signals {
    fn collect(context: &WorkflowContext, outputs: &StepOutputs) -> Self {
        let brand = context.brand_name.trim().to_lowercase();
        let mentions_brand = |text: &str| !brand.is_empty() && text.to_lowercase().contains(&brand);

        let mut signals = Signals {
            completed_steps: outputs.len(),
            has_platforms: !context.platforms.is_empty(),
            ..Default::default()
        };

        if let Some(idea) = outputs.idea() {
            signals.brand_mentioned |= mentions_brand(&idea.title) || mentions_brand(&idea.concept);
            signals.has_key_messages = !idea.key_messages.is_empty();
            signals.has_target_emotion = idea.target_emotion.is_some();
        }
        if let Some(copy) = outputs.copy_design() {
            signals.brand_mentioned |= mentions_brand(&copy.headline);
            signals.headline_chars = copy.headline.chars().count();
            signals.has_call_to_action |= !copy.call_to_action.trim().is_empty();
        }
        if let Some(copy) = outputs.copy_publication() {
            signals.brand_mentioned |= mentions_brand(&copy.caption);
            signals.caption_chars = copy.caption.chars().count();
            signals.hashtags = count_hashtags(&copy.caption, &copy.hashtags);
            signals.has_call_to_action |= copy
                .call_to_action
                .as_deref()
                .is_some_and(|cta| !cta.trim().is_empty());
        }
        if let Some(image) = outputs.base_image() {
            signals.has_image = !image.images.is_empty();
            signals.has_alt_text = image
                .alt_text
                .as_deref()
                .is_some_and(|alt| !alt.trim().is_empty());
        }

        signals
    }
}

/// Distinct hashtags across the listed tags and those written in the caption.
fn count_hashtags(caption: &str, listed: &[String]) -> usize {
    let mut tags: BTreeSet<String> = RE_HASHTAG
        .captures_iter(caption)
        .map(|c| c[1].to_lowercase())
        .collect();
    tags.extend(
        listed
            .iter()
            .map(|t| t.trim().trim_start_matches('#').to_lowercase())
            .filter(|t| !t.is_empty()),
    );
    tags.len()
}

fn clamp(score: i64) -> u8 {
    score.clamp(0, 100) as u8
}

pub fn score(
    context: &WorkflowContext,
    outputs: &StepOutputs,
    config: &AssemblyConfig,
) -> (QualityScores, Vec<Recommendation>) {
    let s = Signals::collect(context, outputs);

    let brand_compliance =
        clamp(40 + 40 * i64::from(s.brand_mentioned) + 20 * i64::from(s.has_key_messages));
    let content_quality = clamp(20 * s.completed_steps as i64);

    let caption_too_long = s.caption_chars > config.max_caption_length;
    let too_many_hashtags = s.hashtags > config.max_hashtags;
    let headline_too_long = s.headline_chars > config.max_headline_length;
    let mut platform_fit = 100;
    if caption_too_long {
        platform_fit -= 30;
    }
    if too_many_hashtags {
        platform_fit -= 20;
    }
    if headline_too_long {
        platform_fit -= 20;
    }
    if !s.has_platforms {
        platform_fit -= 30;
    }
    let platform_fit = clamp(platform_fit);

    let accessibility = match (s.has_image, s.has_alt_text) {
        (false, _) => 70,
        (true, true) => 100,
        (true, false) => 40,
    };

    let estimated_engagement = clamp(
        30 + 10 * s.hashtags.min(3) as i64
            + 25 * i64::from(s.has_call_to_action)
            + 15 * i64::from(s.has_target_emotion),
    );

    let sum = [
        brand_compliance,
        content_quality,
        platform_fit,
        accessibility,
        estimated_engagement,
    ]
    .iter()
    .map(|v| f64::from(*v))
    .sum::<f64>();
    let overall = (sum / 5.0).round() as u8;

    let mut recommendations = Vec::new();
    if caption_too_long {
        recommendations.push(Recommendation {
            kind: RecommendationKind::ShortenCaption,
            message: format!(
                "Caption is {} characters; shorten it to {} or fewer for mobile",
                s.caption_chars, config.max_caption_length
            ),
        });
    }
    if too_many_hashtags {
        recommendations.push(Recommendation {
            kind: RecommendationKind::ReduceHashtags,
            message: format!(
                "Use at most {} hashtags (found {})",
                config.max_hashtags, s.hashtags
            ),
        });
    }
    if headline_too_long {
        recommendations.push(Recommendation {
            kind: RecommendationKind::ShortenHeadline,
            message: format!(
                "Headline is {} characters; keep it under {} so it stays readable on the image",
                s.headline_chars, config.max_headline_length
            ),
        });
    }
    if !s.has_call_to_action {
        recommendations.push(Recommendation {
            kind: RecommendationKind::AddCallToAction,
            message: "Add a call to action".to_string(),
        });
    }
    if s.has_image && !s.has_alt_text {
        recommendations.push(Recommendation {
            kind: RecommendationKind::AddAltText,
            message: "Add alt text to the image for screen readers".to_string(),
        });
    }
    if !s.has_image {
        recommendations.push(Recommendation {
            kind: RecommendationKind::AddImage,
            message: "No image was generated; add a visual before publishing".to_string(),
        });
    }

    (
        QualityScores {
            brand_compliance,
            content_quality,
            platform_fit,
            accessibility,
            estimated_engagement,
            overall,
        },
        recommendations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{
        BaseImageContent, CopyDesignContent, CopyPublicationContent, IdeaContent, ImageAsset,
        StepContent,
    };
    use crate::model::ImageQuality;
    use crate::workflow::context::tests::sample_context;

    fn full_outputs(caption: &str, alt_text: Option<&str>) -> StepOutputs {
        StepOutputs::new()
            .with(StepContent::Idea(IdeaContent {
                title: "Sunbrew summer".to_string(),
                concept: "Cold brew at the beach".to_string(),
                key_messages: vec!["refreshing".to_string()],
                target_emotion: Some("joy".to_string()),
            }))
            .with(StepContent::CopyDesign(CopyDesignContent {
                headline: "Chill out".to_string(),
                subheadline: None,
                call_to_action: "Order now".to_string(),
            }))
            .with(StepContent::CopyPublication(CopyPublicationContent {
                caption: caption.to_string(),
                hashtags: vec!["#summer".to_string(), "coffee".to_string()],
                call_to_action: None,
            }))
            .with(StepContent::BaseImage(BaseImageContent {
                image_prompt: "can on sand".to_string(),
                alt_text: alt_text.map(str::to_string),
                quality: ImageQuality::Standard,
                images: vec![ImageAsset {
                    url: "mock://1.png".to_string(),
                    width: 1024,
                    height: 1024,
                }],
            }))
    }

    #[test]
    fn test_count_hashtags_merges_caption_and_list() {
        let listed = vec!["summer".to_string(), "#coffee".to_string()];
        assert_eq!(count_hashtags("Hot days #Summer #beach", &listed), 3);
    }

    #[test]
    fn test_well_formed_bundle_scores() {
        let (scores, recommendations) = score(
            &sample_context(),
            &full_outputs("Stay cool #beach", Some("A can on sand")),
            &AssemblyConfig::default(),
        );
        assert_eq!(scores.brand_compliance, 100);
        assert_eq!(scores.content_quality, 80);
        assert_eq!(scores.platform_fit, 100);
        assert_eq!(scores.accessibility, 100);
        // 30 + 3 hashtags + CTA + emotion
        assert_eq!(scores.estimated_engagement, 100);
        assert_eq!(scores.overall, 96);
        assert!(recommendations.is_empty());
    }

    #[test]
    fn test_long_caption_and_missing_alt_text() {
        let caption = "x".repeat(200);
        let (scores, recommendations) = score(
            &sample_context(),
            &full_outputs(&caption, None),
            &AssemblyConfig::default(),
        );
        assert_eq!(scores.platform_fit, 70);
        assert_eq!(scores.accessibility, 40);

        let kinds: Vec<_> = recommendations.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RecommendationKind::ShortenCaption, RecommendationKind::AddAltText]
        );
        assert!(recommendations[0].message.contains("shorten it to 150"));
    }

    #[test]
    fn test_empty_outputs() {
        let (scores, recommendations) = score(
            &sample_context(),
            &StepOutputs::new(),
            &AssemblyConfig::default(),
        );
        assert_eq!(scores.content_quality, 0);
        assert_eq!(scores.accessibility, 70);
        let kinds: Vec<_> = recommendations.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RecommendationKind::AddCallToAction, RecommendationKind::AddImage]
        );
    }
}
