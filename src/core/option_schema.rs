//! # Option Schema Compiler
//!
//! Turns declarative option specs (per command, or the program's global
//! options) into the flat lookup tables the argument parser works from.
//! Every schema problem is reported here, before any argument is parsed.

use crate::{
    error::{Error, Result},
    models::{OptionInput, OptionKind, OptionSpec, OptionTable, OptionValue},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

lazy_static! {
    static ref OPTION_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap();
}

/// The normalized parser configuration for one option schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserConfig {
    /// Canonical names of string options.
    pub strings: BTreeSet<String>,
    /// Canonical names of boolean options.
    pub booleans: BTreeSet<String>,
    /// Alias to canonical name.
    pub aliases: BTreeMap<String, String>,
    /// Canonical name to default value.
    pub defaults: BTreeMap<String, OptionValue>,
}

impl ParserConfig {
    /// Resolves a flag name to its canonical option name.
    pub fn canonical<'a>(&'a self, flag: &'a str) -> &'a str {
        self.aliases.get(flag).map_or(flag, String::as_str)
    }

    /// The declared kind of a canonical name.
    pub fn kind_of(&self, name: &str) -> Option<OptionKind> {
        if self.strings.contains(name) {
            Some(OptionKind::String)
        } else if self.booleans.contains(name) {
            Some(OptionKind::Boolean)
        } else {
            None
        }
    }

    /// Whether `name` is a declared canonical option.
    pub fn declares(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    /// Combines two schemas for tokenizing one argument vector.
    ///
    /// Entries of `self` win; entries of `fallback` are only added where they
    /// do not collide with a name or alias of `self`.
    pub fn layered_over(&self, fallback: &Self) -> Self {
        let mut merged = self.clone();
        let taken = |merged: &Self, key: &str| merged.declares(key) || merged.aliases.contains_key(key);

        for name in &fallback.strings {
            if !taken(&merged, name) {
                merged.strings.insert(name.clone());
            }
        }
        for name in &fallback.booleans {
            if !taken(&merged, name) {
                merged.booleans.insert(name.clone());
            }
        }
        for (alias, target) in &fallback.aliases {
            if !taken(&merged, alias) && !self.declares(target) {
                merged.aliases.insert(alias.clone(), target.clone());
            }
        }
        for (name, value) in &fallback.defaults {
            if !self.declares(name) {
                merged
                    .defaults
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        merged
    }
}

/// Compiles an option schema into a [`ParserConfig`].
///
/// # Errors
/// Returns [`Error::Configuration`] for invalid names, duplicated names,
/// aliases claimed twice (or shadowing another option), and defaults whose
/// type contradicts the declared type.
pub fn compile(specs: &[OptionSpec]) -> Result<ParserConfig> {
    let mut config = ParserConfig::default();
    // Every flag name (canonical or alias) to the option that owns it.
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();

    for spec in specs {
        validate_name(&spec.name)?;
        if let Some(owner) = owners.insert(&spec.name, &spec.name) {
            return Err(if owner == spec.name {
                Error::Configuration(format!("option '{}' is declared twice", spec.name))
            } else {
                Error::Configuration(format!(
                    "option '{}' collides with an alias of '{}'",
                    spec.name, owner
                ))
            });
        }

        let kind = spec.effective_kind();
        match kind {
            OptionKind::String => config.strings.insert(spec.name.clone()),
            OptionKind::Boolean => config.booleans.insert(spec.name.clone()),
        };

        if let Some(default) = &spec.default {
            let matches_kind = matches!(
                (kind, default),
                (OptionKind::String, OptionValue::Str(_)) | (OptionKind::Boolean, OptionValue::Bool(_))
            );
            if !matches_kind {
                return Err(Error::Configuration(format!(
                    "default '{}' of option '{}' does not match its type",
                    default, spec.name
                )));
            }
            config.defaults.insert(spec.name.clone(), default.clone());
        }
    }

    for spec in specs {
        for alias in &spec.aliases {
            if alias == &spec.name {
                continue;
            }
            validate_name(alias)?;
            if let Some(owner) = owners.insert(alias, &spec.name) {
                return Err(Error::Configuration(format!(
                    "alias '{}' of option '{}' is already claimed by '{}'",
                    alias, spec.name, owner
                )));
            }
            config.aliases.insert(alias.clone(), spec.name.clone());
        }
    }

    log::trace!("Compiled option schema: {:?}", config);
    Ok(config)
}

fn validate_name(name: &str) -> Result<()> {
    if OPTION_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::Configuration(format!("'{}' is not a valid option name", name)))
    }
}

/// Builds an [`OptionSpec`] from its user-facing form.
pub fn spec_from_input(name: &str, input: OptionInput) -> Result<OptionSpec> {
    let table = match input {
        OptionInput::Shorthand(kind) => match kind.as_str() {
            "string" => OptionTable {
                kind: Some(OptionKind::String),
                ..OptionTable::default()
            },
            "boolean" => OptionTable {
                kind: Some(OptionKind::Boolean),
                ..OptionTable::default()
            },
            other => {
                return Err(Error::Configuration(format!(
                    "option '{}' has unknown type '{}'",
                    name, other
                )));
            }
        },
        OptionInput::Full(table) => table,
    };

    let aliases = table
        .alias
        .into_iter()
        .chain(table.aliases)
        .flat_map(|a| a.into_vec())
        .collect();

    Ok(OptionSpec {
        name: name.to_string(),
        kind: table.kind,
        aliases,
        default: table.default,
        required: table.required,
        description: table.description,
    })
}

/// Reads an ordered option table (`[options]` in a manifest or `cli.toml`).
pub fn specs_from_table(table: &toml::Table) -> Result<Vec<OptionSpec>> {
    table
        .iter()
        .map(|(name, value)| {
            let input: OptionInput = value
                .clone()
                .try_into()
                .map_err(|e| Error::Configuration(format!("option '{}': {}", name, e)))?;
            spec_from_input(name, input)
        })
        .collect()
}
