// src/core/registry.rs

use crate::{
    core::option_schema::{self, ParserConfig},
    error::{Error, Result},
    models::CommandDefinition,
};
use std::collections::HashMap;
use std::sync::Arc;

/// A command together with its compiled option schema.
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    /// The command as declared.
    pub definition: Arc<CommandDefinition>,
    /// The command's compiled option schema.
    pub parser: ParserConfig,
}

/// An ordered set of commands keyed by their name path.
///
/// Lookups are exact; prefix matching is the router's job. Registration
/// order is preserved and drives help listings.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<RegisteredCommand>,
    index: HashMap<Vec<String>, usize>,
    level: usize,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command, compiling its option schema.
    ///
    /// # Errors
    /// [`Error::DuplicateCommand`] if the path is taken, [`Error::Configuration`]
    /// if the path is empty or the option schema is invalid.
    pub fn register(&mut self, definition: CommandDefinition) -> Result<()> {
        let path = definition.name_path.clone();
        if path.is_empty() || path.iter().any(|segment| segment.is_empty()) {
            return Err(Error::Configuration(format!(
                "command path {:?} has an empty segment",
                path
            )));
        }
        if self.index.contains_key(&path) {
            return Err(Error::DuplicateCommand(path.join(" ")));
        }

        let parser = option_schema::compile(&definition.options).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("command '{}': {}", path.join(" "), msg))
            }
            other => other,
        })?;

        log::debug!("Registered command {:?}", path);
        self.level = self.level.max(path.len());
        self.index.insert(path, self.entries.len());
        self.entries.push(RegisteredCommand {
            definition: Arc::new(definition),
            parser,
        });
        Ok(())
    }

    /// Registers every command in order, stopping at the first failure.
    pub fn extend(&mut self, definitions: impl IntoIterator<Item = CommandDefinition>) -> Result<()> {
        definitions
            .into_iter()
            .try_for_each(|definition| self.register(definition))
    }

    /// Finds the command registered under exactly `path`.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&RegisteredCommand> {
        let key: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        self.index.get(&key).and_then(|&i| self.entries.get(i))
    }

    /// Every registered path, in registration order.
    pub fn all_paths(&self) -> Vec<Vec<String>> {
        self.entries
            .iter()
            .map(|entry| entry.definition.name_path.clone())
            .collect()
    }

    /// The longest registered path length.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no command is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The nearest registered descendants of `prefix`, in registration order.
    ///
    /// Intermediate segments without a command of their own are transparent:
    /// with only `generate key` registered, the root lists `generate key`.
    pub fn nearest_descendants<S: AsRef<str>>(&self, prefix: &[S]) -> Vec<&RegisteredCommand> {
        let prefix: Vec<&str> = prefix.iter().map(AsRef::as_ref).collect();
        self.entries
            .iter()
            .filter(|entry| {
                let path = &entry.definition.name_path;
                if path.len() <= prefix.len() || !starts_with(path, &prefix) {
                    return false;
                }
                // No registered command sits strictly between `prefix` and `path`.
                (prefix.len() + 1..path.len()).all(|depth| {
                    path.get(..depth)
                        .is_none_or(|between| self.lookup(between).is_none())
                })
            })
            .collect()
    }
}

fn starts_with(path: &[String], prefix: &[&str]) -> bool {
    path.iter().zip(prefix).all(|(a, b)| a == b)
}
