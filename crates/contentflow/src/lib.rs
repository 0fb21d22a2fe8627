pub mod assembler;
pub mod billing;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod provider;
pub mod versioning;
pub mod workflow;

pub use assembler::{ContentAssembler, FinalBundle, PublishingPlan, QualityScores};
pub use billing::{CostMeter, LedgerEntry, Operation, PricingTable};
pub use config::{load_config, EngineConfig};
pub use content::{StepContent, SCHEMA_VERSION};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, EngineError, Result};
pub use logging::{init_logging, LogFormat};
pub use model::{ImageQuality, JobStatus, LedgerEntryType, StepKind, StepStatus, VersionStatus};
pub use provider::{ImageProvider, ProviderError, Providers, TextProvider};
pub use versioning::{ContentVersion, VersionComparison, VersionMetadata, VersionStore};
pub use workflow::{
    ContentEngine, StepResult, WorkflowContext, WorkflowOptions, WorkflowResult,
};
