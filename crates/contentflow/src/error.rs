use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::model::StepKind;
use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed context, malformed provider payload, or a cross-kind comparison.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient balance for agency '{agency_id}': required {required}, available {available}")]
    InsufficientBalance {
        agency_id: String,
        required: i64,
        available: i64,
    },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Operation not allowed: {0}")]
    OperationNotAllowed(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// The message stored on a failed job: names the step and the cause.
    pub fn step_failure_message(step: StepKind, cause: &EngineError) -> String {
        format!("Step {} failed: {}", step, cause)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid posting time '{value}' for platform '{platform}': expected HH:MM")]
    InvalidPostingTime { platform: String, value: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
