// src/system/executor.rs

use crate::{CancellationToken, core::commons};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command as TokioCommand;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{0}' exited with a non-zero error code.")]
    NonZeroExitStatus(String),
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("Operation was cancelled by the user.")]
    Cancelled,
}

/// Runs one shell line and returns its captured standard output.
/// Stderr is passed through to the user's terminal.
///
/// A leading `-` ignores a non-zero exit status. The child is killed if the
/// cancellation token is raised while it runs.
pub async fn execute_command(
    command_line: &str,
    cwd: &Path,
    env_vars: &HashMap<String, String>,
    cancellation_token: &CancellationToken,
) -> Result<String, ExecutionError> {
    if commons::check_for_cancellation(cancellation_token).is_err() {
        return Err(ExecutionError::Cancelled);
    }

    let trimmed_command = command_line.trim();
    let (final_command_line, ignore_errors) = match trimmed_command.strip_prefix('-') {
        Some(rest) => (rest.trim(), true),
        None => (trimmed_command, false),
    };
    if final_command_line.is_empty() {
        return Ok(String::new());
    }

    let parts = shlex::split(final_command_line)
        .ok_or_else(|| ExecutionError::CommandParse(final_command_line.to_string()))?;
    let Some((program, args)) = parts.split_first() else {
        return Ok(String::new());
    };
    let clean_cwd = dunce::simplified(cwd);

    let mut command = TokioCommand::new(program);
    command
        .args(args)
        .current_dir(clean_cwd)
        .envs(env_vars)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    log::debug!("Spawning '{}' in '{}'", final_command_line, clean_cwd.display());

    // Built-ins like `echo` are not executables on Windows; retry through `cmd /C`.
    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            TokioCommand::new("cmd")
                .arg("/C")
                .arg(final_command_line)
                .current_dir(clean_cwd)
                .envs(env_vars)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| ExecutionError::CommandFailed(final_command_line.to_string(), e))?
        }
        Err(e) => {
            return Err(ExecutionError::CommandFailed(
                final_command_line.to_string(),
                e,
            ));
        }
    };

    // Dropping the pending `wait_with_output` future kills the child.
    let output = tokio::select! {
        output = child.wait_with_output() => output
            .map_err(|e| ExecutionError::CommandFailed(final_command_line.to_string(), e))?,
        _ = commons::wait_for_cancellation(cancellation_token) => {
            log::debug!("Cancellation requested, killing '{}'", final_command_line);
            return Err(ExecutionError::Cancelled);
        }
    };

    if !output.status.success() && !ignore_errors {
        return Err(ExecutionError::NonZeroExitStatus(
            final_command_line.to_string(),
        ));
    }

    String::from_utf8(output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
        command: final_command_line.to_string(),
        source: e,
    })
}
