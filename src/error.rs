// src/error.rs

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::constants::EXIT_INTERRUPTED;

/// How an error should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The program itself is misconfigured; this is a bug in the tool.
    Fault,
    /// The invocation failed; report it and exit non-zero.
    Diagnostic,
}

/// Every failure the routing engine can report.
#[derive(Error, Debug)]
pub enum Error {
    /// An option schema is malformed (alias collision, invalid name or type).
    #[error("Invalid option configuration: {0}")]
    Configuration(String),

    /// Two commands were registered under the same path.
    #[error("Command '{0}' is already registered.")]
    DuplicateCommand(String),

    /// A required option did not resolve to a value.
    #[error("No value provided for required argument `{option}` of command '{command}'.")]
    MissingArgument {
        /// The display name of the command.
        command: String,
        /// The canonical name of the missing option.
        option: String,
    },

    /// No registered command matches the input tokens.
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// A named middleware could neither be found on the command nor loaded.
    #[error("Middleware '{0}' could not be found.")]
    ModuleNotFound(String),

    /// A middleware or handler failed. The original error is kept as-is.
    #[error(transparent)]
    Handler(anyhow::Error),

    /// The invocation was cancelled before the chain completed.
    #[error("Operation was cancelled by the user.")]
    Cancelled,

    /// A middleware did not finish within the configured deadline.
    #[error("Middleware '{name}' did not complete within {timeout:?}.")]
    TimedOut {
        /// The middleware (or `run`) that stalled.
        name: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// A manifest or configuration file is invalid.
    #[error("Failed to parse '{path}': {message}")]
    Manifest {
        /// The file that failed to parse.
        path: PathBuf,
        /// The parser's message.
        message: String,
    },

    /// An I/O error occurred while reading the program's files.
    #[error("I/O error while loading the program: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classifies the error by origin.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Configuration(_)
            | Self::DuplicateCommand(_)
            | Self::Manifest { .. }
            | Self::Io(_) => Severity::Fault,
            Self::MissingArgument { .. }
            | Self::CommandNotFound(_)
            | Self::ModuleNotFound(_)
            | Self::Handler(_)
            | Self::Cancelled
            | Self::TimedOut { .. } => Severity::Diagnostic,
        }
    }

    /// The process exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => EXIT_INTERRUPTED,
            _ => 1,
        }
    }
}

/// A specialized `Result` for the routing engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_engine_errors_are_faults() {
        assert_eq!(
            Error::Configuration("alias 'f'".into()).severity(),
            Severity::Fault
        );
        assert_eq!(
            Error::DuplicateCommand("apps".into()).severity(),
            Severity::Fault
        );
    }

    #[test]
    fn test_invocation_errors_are_diagnostics() {
        let missing = Error::MissingArgument {
            command: "apps add".into(),
            option: "stack".into(),
        };
        assert_eq!(missing.severity(), Severity::Diagnostic);
        assert_eq!(
            Error::CommandNotFound("nope".into()).severity(),
            Severity::Diagnostic
        );
        assert_eq!(
            Error::Handler(anyhow!("boom")).severity(),
            Severity::Diagnostic
        );
    }

    #[test]
    fn test_handler_error_message_is_unmodified() {
        let err = Error::Handler(anyhow!("generate key some-key"));
        assert_eq!(err.to_string(), "generate key some-key");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Cancelled.exit_code(), 130);
        assert_eq!(Error::CommandNotFound("x".into()).exit_code(), 1);
    }
}
