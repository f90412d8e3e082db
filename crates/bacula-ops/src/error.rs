use std::path::PathBuf;
use thiserror::Error;

use crate::relation::RelationError;
use crate::secrets::SecretError;
use crate::state::StateError;
use crate::template::TemplateError;

/// Top-level outcome of a failed reconcile.
///
/// `NotReady` clears up by itself once the missing input is published and is
/// surfaced as a waiting status. `Unrecoverable` needs an operator and is
/// surfaced as a blocked status; the live configuration is left untouched.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("{0}")]
    NotReady(String),

    #[error("{0}")]
    Unrecoverable(String),
}

impl ReconcileError {
    pub fn not_ready(reason: impl Into<String>) -> Self {
        ReconcileError::NotReady(reason.into())
    }

    pub fn unrecoverable(reason: impl Into<String>) -> Self {
        ReconcileError::Unrecoverable(reason.into())
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, ReconcileError::NotReady(_))
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("error in {service} configuration")]
    InvalidConfig { service: String, output: String },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to commit '{from}' to '{to}': {source}")]
    Commit {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{program}' failed: {message}")]
    Command { program: String, message: String },

    #[error("Catalog error: {0}")]
    Catalog(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Failed to parse settings: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Settings validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

impl From<ServiceError> for ReconcileError {
    fn from(err: ServiceError) -> Self {
        ReconcileError::Unrecoverable(err.to_string())
    }
}

impl From<SecretError> for ReconcileError {
    fn from(err: SecretError) -> Self {
        ReconcileError::Unrecoverable(format!("secret store failure: {}", err))
    }
}

impl From<StateError> for ReconcileError {
    fn from(err: StateError) -> Self {
        ReconcileError::Unrecoverable(err.to_string())
    }
}

impl From<RelationError> for ReconcileError {
    fn from(err: RelationError) -> Self {
        ReconcileError::Unrecoverable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_displays_reason_verbatim() {
        let err = ReconcileError::not_ready("waiting for peer relation");
        assert_eq!(err.to_string(), "waiting for peer relation");
        assert!(err.is_not_ready());
    }

    #[test]
    fn test_invalid_config_names_the_service() {
        let err = ServiceError::InvalidConfig {
            service: "bacula-dir".to_string(),
            output: "syntax error".to_string(),
        };
        assert_eq!(err.to_string(), "error in bacula-dir configuration");

        let reconcile: ReconcileError = err.into();
        assert!(!reconcile.is_not_ready());
    }
}
