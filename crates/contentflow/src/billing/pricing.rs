use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::PricingConfig;
use crate::error::EngineError;
use crate::model::{ImageQuality, StepKind};

/// A billable operation.
///
/// Prices come from a lookup table rather than from provider token counts:
/// text stages cost a flat amount, image renders cost a quality tier per
/// variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    Text(StepKind),
    Image {
        quality: ImageQuality,
        variations: u32,
    },
}

impl Operation {
    pub fn for_step(step: StepKind, quality: ImageQuality, variations: u32) -> Self {
        match step {
            StepKind::BaseImage => Operation::Image {
                quality,
                variations,
            },
            StepKind::Idea
            | StepKind::CopyDesign
            | StepKind::CopyPublication
            | StepKind::FinalDesign => Operation::Text(step),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricingTable {
    steps: BTreeMap<StepKind, i64>,
    image_tiers: BTreeMap<ImageQuality, i64>,
    token_value: f64,
}

impl PricingTable {
    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            steps: config.steps.clone(),
            image_tiers: config.image_tiers.clone(),
            token_value: config.token_value,
        }
    }

    /// Price in billing tokens. A missing table entry is a configuration
    /// hole and is reported rather than priced at zero.
    pub fn price(&self, operation: Operation) -> Result<i64, EngineError> {
        match operation {
            Operation::Text(step) => self.steps.get(&step).copied().ok_or_else(|| {
                EngineError::validation(format!("No price configured for step {}", step))
            }),
            Operation::Image {
                quality,
                variations,
            } => {
                let tier = self.image_tiers.get(&quality).copied().ok_or_else(|| {
                    EngineError::validation(format!("No image pricing tier for {}", quality))
                })?;
                Ok(tier * i64::from(variations.max(1)))
            }
        }
    }

    /// Monetary value of `amount` billing tokens.
    pub fn to_money(&self, amount: i64) -> f64 {
        amount as f64 * self.token_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_stages_are_flat() {
        let table = PricingTable::from_config(&PricingConfig::default());
        assert_eq!(table.price(Operation::Text(StepKind::Idea)).unwrap(), 10);
        assert_eq!(table.price(Operation::Text(StepKind::FinalDesign)).unwrap(), 25);
    }

    #[test]
    fn test_image_stage_is_tiered_per_variation() {
        let table = PricingTable::from_config(&PricingConfig::default());
        let standard = Operation::for_step(StepKind::BaseImage, ImageQuality::Standard, 1);
        let hd_pair = Operation::for_step(StepKind::BaseImage, ImageQuality::Hd, 2);
        assert_eq!(table.price(standard).unwrap(), 40);
        assert_eq!(table.price(hd_pair).unwrap(), 160);
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let mut config = PricingConfig::default();
        config.steps.remove(&StepKind::CopyDesign);
        let table = PricingTable::from_config(&config);
        assert!(table.price(Operation::Text(StepKind::CopyDesign)).is_err());
    }

    #[test]
    fn test_to_money() {
        let table = PricingTable::from_config(&PricingConfig::default());
        assert!((table.to_money(250) - 2.5).abs() < 1e-9);
    }
}
