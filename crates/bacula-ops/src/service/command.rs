use std::io::Write;
use std::process::{Command, Output, Stdio};

use crate::error::ServiceError;

/// Formats a failed command's output, preferring stderr.
pub(crate) fn format_output(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => format!(
            "Command failed with exit code {}",
            output.status.code().unwrap_or(-1)
        ),
        (true, false) => stdout,
        (false, true) => stderr,
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}

/// Runs `program` and returns its output whatever the exit status.
pub(crate) fn output(program: &str, args: &[&str]) -> Result<Output, ServiceError> {
    Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ServiceError::Command {
            program: program.to_string(),
            message: e.to_string(),
        })
}

/// Runs `program` and fails unless it exits successfully.
pub(crate) fn run(program: &str, args: &[&str]) -> Result<Output, ServiceError> {
    run_command(Command::new(program).args(args), program)
}

pub(crate) fn run_command(command: &mut Command, program: &str) -> Result<Output, ServiceError> {
    let output = command.output().map_err(|e| ServiceError::Command {
        program: program.to_string(),
        message: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(ServiceError::Command {
            program: program.to_string(),
            message: format_output(&output),
        });
    }
    Ok(output)
}

/// Runs `program` feeding `input` on stdin.
pub(crate) fn run_with_input(program: &str, args: &[&str], input: &str) -> Result<Output, ServiceError> {
    let command_error = |message: String| ServiceError::Command {
        program: program.to_string(),
        message,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| command_error(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|e| command_error(e.to_string()))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| command_error(e.to_string()))?;
    if !output.status.success() {
        return Err(command_error(format_output(&output)));
    }
    Ok(output)
}
