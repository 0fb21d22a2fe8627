use serde::{Deserialize, Serialize};

use crate::config::PublishingConfig;

/// When to post on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingSlot {
    /// Upper-cased platform name.
    pub platform: String,
    /// `HH:MM`, local to the audience.
    pub posting_time: String,
    /// The platform is not in the lookup table and got the default time.
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishingPlan {
    pub slots: Vec<PostingSlot>,
    /// Present when more than one platform is targeted.
    pub cross_promotion: Option<String>,
}

impl PublishingPlan {
    /// One slot per distinct platform, in request order.
    pub fn for_platforms(platforms: &[String], config: &PublishingConfig) -> Self {
        let mut slots: Vec<PostingSlot> = Vec::with_capacity(platforms.len());
        for platform in platforms {
            let platform = platform.trim().to_uppercase();
            if slots.iter().any(|s| s.platform == platform) {
                continue;
            }
            let (posting_time, is_default) = match config.posting_times.get(&platform) {
                Some(time) => (time.clone(), false),
                None => (config.default_posting_time.clone(), true),
            };
            slots.push(PostingSlot {
                platform,
                posting_time,
                is_default,
            });
        }

        let cross_promotion = (slots.len() > 1).then(|| {
            let names: Vec<&str> = slots.iter().map(|s| s.platform.as_str()).collect();
            format!(
                "Publish on {} first, then share to {} and link the posts to each other",
                names[0],
                names[1..].join(", ")
            )
        });

        Self {
            slots,
            cross_promotion,
        }
    }

    pub fn time_for(&self, platform: &str) -> Option<&str> {
        let platform = platform.trim().to_uppercase();
        self.slots
            .iter()
            .find(|s| s.platform == platform)
            .map(|s| s.posting_time.as_str())
    }
}
