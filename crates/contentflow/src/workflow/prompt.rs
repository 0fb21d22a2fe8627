//! Stage-specific prompts.
//!
//! A prompt is the stage instruction (built-in, or the caller's custom
//! prompt for that step), followed by the brand and campaign brief, the
//! outputs of earlier steps and the run's custom instructions.

use std::fmt::Write;

use crate::config::ModelsConfig;
use crate::error::Result;
use crate::model::StepKind;
use crate::provider::PromptContext;

use super::context::{StepOutputs, WorkflowContext};

fn system_prompt(step: StepKind) -> &'static str {
    match step {
        StepKind::Idea => {
            "You are a creative director. Respond with JSON: \
             {title, concept, key_messages[], target_emotion}."
        }
        StepKind::CopyDesign => {
            "You are a senior copywriter writing on-image copy. Respond with JSON: \
             {headline, subheadline, call_to_action}."
        }
        StepKind::CopyPublication => {
            "You are a social media copywriter. Respond with JSON: \
             {caption, hashtags[], call_to_action}."
        }
        StepKind::BaseImage => {
            "You are an art director briefing an image model. Respond with JSON: \
             {image_prompt, alt_text}."
        }
        StepKind::FinalDesign => {
            "You are a layout designer. Respond with JSON: \
             {layout, text_overlays[{text, position}], color_palette[]}."
        }
    }
}

fn default_instruction(step: StepKind) -> &'static str {
    match step {
        StepKind::Idea => "Propose one campaign idea that fits the brief.",
        StepKind::CopyDesign => "Write the headline and call to action for the visual.",
        StepKind::CopyPublication => {
            "Write the post caption and hashtags for the target platforms."
        }
        StepKind::BaseImage => "Describe the base image that carries the idea.",
        StepKind::FinalDesign => "Compose the final design from the copy and the base image.",
    }
}

/// Builds the provider input for `step`.
pub fn build(
    step: StepKind,
    context: &WorkflowContext,
    outputs: &StepOutputs,
    models: &ModelsConfig,
) -> Result<PromptContext> {
    let mut prompt = String::new();

    let instruction = context
        .options
        .custom_prompts
        .get(&step)
        .map(String::as_str)
        .unwrap_or_else(|| default_instruction(step));
    let _ = writeln!(prompt, "{}", instruction.trim());

    let _ = writeln!(prompt, "\nBrand: {}", context.brand_name);
    let optional = [
        ("Brand description", &context.brand_description),
        ("Brand voice", &context.brand_voice),
        ("Target audience", &context.target_audience),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            let _ = writeln!(prompt, "{}: {}", label, value);
        }
    }

    let _ = writeln!(prompt, "Campaign: {}", context.campaign_name);
    if let Some(objective) = &context.campaign_objective {
        let _ = writeln!(prompt, "Objective: {}", objective);
    }
    if let Some(description) = &context.campaign_description {
        let _ = writeln!(prompt, "Description: {}", description);
    }
    if !context.platforms.is_empty() {
        let _ = writeln!(prompt, "Platforms: {}", context.platforms.join(", "));
    }

    if !outputs.is_empty() {
        let _ = writeln!(prompt, "\nPrevious steps:");
        for (kind, content) in outputs.iter() {
            let _ = writeln!(prompt, "- {}: {}", kind, content.summary());
        }
    }

    if let Some(instructions) = &context.options.custom_instructions {
        let _ = writeln!(prompt, "\nAdditional instructions: {}", instructions);
    }

    Ok(PromptContext {
        step,
        model: models.text_model_for(step).to_string(),
        system_prompt: system_prompt(step).to_string(),
        prompt: prompt.trim_end().to_string(),
        previous_outputs: outputs.to_json_map()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{IdeaContent, StepContent};
    use crate::workflow::context::tests::sample_context;

    #[test]
    fn test_prompt_includes_brief_and_earlier_outputs() {
        let outputs = StepOutputs::new().with(StepContent::Idea(IdeaContent {
            title: "Beach brew".to_string(),
            concept: "Coffee on the sand".to_string(),
            key_messages: vec![],
            target_emotion: None,
        }));
        let prompt = build(
            StepKind::CopyDesign,
            &sample_context(),
            &outputs,
            &ModelsConfig::default(),
        )
        .unwrap();

        assert!(prompt.prompt.starts_with("Write the headline"));
        assert!(prompt.prompt.contains("Brand: Sunbrew"));
        assert!(prompt.prompt.contains("IDEA: Beach brew"));
        assert!(prompt.previous_outputs.contains_key(&StepKind::Idea));
        assert_eq!(prompt.model, "gpt-4o-mini");
    }

    #[test]
    fn test_custom_prompt_and_instructions() {
        let mut context = sample_context();
        context
            .options
            .custom_prompts
            .insert(StepKind::Idea, "Pitch something bold.".to_string());
        context.options.custom_instructions = Some("Avoid puns.".to_string());

        let mut models = ModelsConfig::default();
        models.steps.insert(StepKind::Idea, "big-model".to_string());

        let prompt = build(StepKind::Idea, &context, &StepOutputs::new(), &models).unwrap();
        assert!(prompt.prompt.starts_with("Pitch something bold."));
        assert!(prompt.prompt.ends_with("Additional instructions: Avoid puns."));
        assert_eq!(prompt.model, "big-model");
        assert!(!prompt.prompt.contains("Previous steps"));
    }
}
