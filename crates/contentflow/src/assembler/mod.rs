//! Turns the outputs of a finished run into a publishable bundle.

use serde::{Deserialize, Serialize};

use crate::config::{AssemblyConfig, PublishingConfig};
use crate::content::{
    BaseImageContent, CopyDesignContent, CopyPublicationContent, FinalDesignContent,
    IdeaContent,
};
use crate::db::now_timestamp;
use crate::model::StepKind;
use crate::workflow::{StepOutputs, WorkflowContext};

pub mod plan;
pub mod scores;

pub use plan::{PostingSlot, PublishingPlan};
pub use scores::{QualityScores, Recommendation, RecommendationKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalBundle {
    pub job_id: String,
    pub brand_name: String,
    pub campaign_name: String,
    /// Steps whose output is part of the bundle, in pipeline order.
    pub steps: Vec<StepKind>,
    pub idea: Option<IdeaContent>,
    pub copy_design: Option<CopyDesignContent>,
    pub copy_publication: Option<CopyPublicationContent>,
    pub base_image: Option<BaseImageContent>,
    pub final_design: Option<FinalDesignContent>,
    pub publishing_plan: PublishingPlan,
    pub scores: QualityScores,
    pub recommendations: Vec<Recommendation>,
    pub assembled_at: String,
}

#[derive(Debug, Clone)]
pub struct ContentAssembler {
    publishing: PublishingConfig,
    assembly: AssemblyConfig,
}

impl ContentAssembler {
    pub fn new(publishing: PublishingConfig, assembly: AssemblyConfig) -> Self {
        Self {
            publishing,
            assembly,
        }
    }

    pub fn publishing_plan(&self, platforms: &[String]) -> PublishingPlan {
        PublishingPlan::for_platforms(platforms, &self.publishing)
    }

    pub fn assemble(
        &self,
        job_id: &str,
        context: &WorkflowContext,
        outputs: &StepOutputs,
    ) -> FinalBundle {
        let (scores, recommendations) = scores::score(context, outputs, &self.assembly);

        let mut final_design = outputs.final_design().cloned();
        if let (Some(design), Some(image)) = (final_design.as_mut(), outputs.base_image()) {
            if design.image_url.is_none() {
                design.image_url = image.images.first().map(|asset| asset.url.clone());
            }
        }

        FinalBundle {
            job_id: job_id.to_string(),
            brand_name: context.brand_name.clone(),
            campaign_name: context.campaign_name.clone(),
            steps: outputs.iter().map(|(kind, _)| kind).collect(),
            idea: outputs.idea().cloned(),
            copy_design: outputs.copy_design().cloned(),
            copy_publication: outputs.copy_publication().cloned(),
            base_image: outputs.base_image().cloned(),
            final_design,
            publishing_plan: self.publishing_plan(&context.platforms),
            scores,
            recommendations,
            assembled_at: now_timestamp(),
        }
    }
}
