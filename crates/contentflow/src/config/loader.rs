use std::path::Path;

use chrono::NaiveTime;

use crate::config::schema::EngineConfig;
use crate::error::ConfigError;
use crate::model::{ImageQuality, StepKind};

const SCHEMA_JSON: &str = include_str!("../../../../schema/engine-config-v1.json");

/// Loads a config file. `.yaml`/`.yml` files are read as YAML, everything
/// else as JSON.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        load_config_from_yaml_str(&content)
    } else {
        load_config_from_str(&content)
    }
}

pub fn load_config_from_str(content: &str) -> Result<EngineConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;
    load_config_from_value(json_value)
}

pub fn load_config_from_yaml_str(content: &str) -> Result<EngineConfig, ConfigError> {
    let json_value: serde_json::Value = serde_yaml::from_str(content)?;
    load_config_from_value(json_value)
}

fn load_config_from_value(json_value: serde_json::Value) -> Result<EngineConfig, ConfigError> {
    validate_schema(&json_value)?;

    let config: EngineConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Semantic checks the JSON schema cannot express.
pub fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    for (platform, time) in &config.publishing.posting_times {
        parse_posting_time(platform, time)?;
    }
    parse_posting_time("default", &config.publishing.default_posting_time)?;

    for step in StepKind::ALL {
        if step.is_image() {
            continue;
        }
        match config.pricing.steps.get(&step) {
            Some(price) if *price < 0 => {
                return Err(ConfigError::Validation {
                    message: format!("Price for {} must not be negative", step),
                })
            }
            Some(_) => {}
            None => {
                return Err(ConfigError::Validation {
                    message: format!("Missing price for step {}", step),
                })
            }
        }
    }

    for quality in [ImageQuality::Standard, ImageQuality::Hd] {
        match config.pricing.image_tiers.get(&quality) {
            Some(price) if *price >= 0 => {}
            Some(_) => {
                return Err(ConfigError::Validation {
                    message: format!("Image tier {} must not be negative", quality),
                })
            }
            None => {
                return Err(ConfigError::Validation {
                    message: format!("Missing image pricing tier {}", quality),
                })
            }
        }
    }

    if config.pricing.token_value <= 0.0 {
        return Err(ConfigError::Validation {
            message: "token_value must be positive".to_string(),
        });
    }

    if config.limits.max_image_variations == 0 {
        return Err(ConfigError::Validation {
            message: "max_image_variations must be at least 1".to_string(),
        });
    }

    Ok(())
}

fn parse_posting_time(platform: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| ConfigError::InvalidPostingTime {
        platform: platform.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = load_config_from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config.pricing.steps[&StepKind::Idea], 10);
        assert_eq!(config.pricing.image_tiers[&ImageQuality::Hd], 80);
        assert_eq!(config.publishing.posting_times["INSTAGRAM"], "11:00");
        assert_eq!(config.publishing.default_posting_time, "12:00");
    }

    #[test]
    fn test_default_config_is_valid() {
        validate_config(&EngineConfig::default()).unwrap();
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = load_config_from_str(r#"{"version": "2.0"}"#).unwrap_err();
        assert!(err.to_string().contains("Unsupported config version"));
    }

    #[test]
    fn test_rejects_bad_posting_time() {
        let err = load_config_from_str(
            r#"{"version": "1.0", "publishing": {"posting_times": {"INSTAGRAM": "25:99"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPostingTime { .. }));
    }

    #[test]
    fn test_rejects_unknown_fields_via_schema() {
        let err = load_config_from_str(r#"{"version": "1.0", "workers": 4}"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_yaml_config() {
        let config = load_config_from_yaml_str(
            "version: \"1.0\"\npricing:\n  image_tiers:\n    STANDARD: 5\n    HD: 9\n",
        )
        .unwrap();
        assert_eq!(config.pricing.image_tiers[&ImageQuality::Standard], 5);
    }
}
