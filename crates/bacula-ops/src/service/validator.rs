use std::path::Path;

use super::command;
use crate::error::ServiceError;

/// External check run against a staged configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// Runs `program args... <staged file>`; a zero exit status means valid.
    Command { program: String, args: Vec<String> },
    /// For services that have no way to check their configuration.
    Skip,
}

/// Result of validating a staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub output: String,
}

impl Validator {
    pub fn command(program: impl Into<String>) -> Self {
        Validator::Command {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn command_with_args(program: impl Into<String>, args: &[&str]) -> Self {
        Validator::Command {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Checks `staged`. Failing to launch the validator is an error, a
    /// rejected configuration is not.
    pub fn validate(&self, staged: &Path) -> Result<Validation, ServiceError> {
        match self {
            Validator::Skip => Ok(Validation {
                valid: true,
                output: String::new(),
            }),
            Validator::Command { program, args } => {
                let staged = staged.to_string_lossy();
                let mut argv: Vec<&str> = args.iter().map(String::as_str).collect();
                argv.push(&staged);

                let output = command::output(program, &argv)?;
                Ok(Validation {
                    valid: output.status.success(),
                    output: command::format_output(&output),
                })
            }
        }
    }
}
