pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_config_from_yaml_str, validate_config};
pub use schema::{
    AssemblyConfig, EngineConfig, LimitsConfig, ModelsConfig, PricingConfig, PublishingConfig,
    DEFAULT_POSTING_TIME,
};
