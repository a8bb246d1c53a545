//! Express-like command routing for command-line applications.
//!
//! A [`program::Program`] owns a [`core::registry::Registry`] of commands,
//! routes raw arguments to the deepest matching command, parses options
//! against the command's schema and runs the command's middleware chain
//! before its handler.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Shared flag raised when the invocation should stop (e.g. on Ctrl+C).
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod error;
pub mod models;
pub mod program;
pub mod system;

pub use error::{Error, Severity};
pub use models::{
    BoundArgs, CommandDefinition, Context, MiddlewareRef, OptionKind, OptionSpec, OptionValue,
    Output,
};
pub use program::{Outcome, Program};
