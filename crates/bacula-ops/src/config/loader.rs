use std::path::Path;

use crate::config::schema::Settings;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/settings-v1.json");

const SUPPORTED_VERSION: &str = "1.0";

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

/// Parses YAML settings, validates them against the embedded schema and
/// fills in defaults. An empty document yields the defaults.
pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let mut json_value: serde_json::Value = serde_yaml::from_str(content)?;
    if json_value.is_null() {
        json_value = serde_json::Value::Object(serde_json::Map::new());
    }

    validate_schema(&json_value)?;

    let settings: Settings = serde_json::from_value(json_value)?;

    validate_settings(&settings)?;

    Ok(settings)
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

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if let Some(version) = &settings.version {
        if version != SUPPORTED_VERSION {
            return Err(ConfigError::Validation {
                message: format!("Unsupported settings version: {}", version),
            });
        }
    }

    if !Path::new(&settings.paths.noop_script).is_absolute() {
        return Err(ConfigError::Validation {
            message: format!(
                "noop-script must be an absolute path: {}",
                settings.paths.noop_script
            ),
        });
    }

    for retention in [
        &settings.server.file_retention,
        &settings.server.job_retention,
        &settings.server.volume_retention,
    ] {
        if retention.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "retention periods cannot be blank".to_string(),
            });
        }
    }

    Ok(())
}
