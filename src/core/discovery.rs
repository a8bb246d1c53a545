// src/core/discovery.rs

//! # Discovery
//!
//! Builds command definitions from the manifests under `<root>/commands`.
//! The file path is the command path: `commands/apps/add.toml` is `apps add`,
//! and `commands/apps/index.toml` is `apps` itself.

use crate::{
    constants::{COMMANDS_DIR, INDEX_MANIFEST_STEM, MANIFEST_EXTENSION},
    core::{option_schema, pipeline::Handler},
    error::{Error, Result},
    models::{CommandDefinition, CommandManifest},
    system::script::{ScriptHandler, ScriptMiddleware},
};
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Component, Path},
    sync::Arc,
};
use walkdir::WalkDir;

/// Handlers that manifests can name with `handler = "<name>"`.
#[derive(Default, Clone)]
pub struct HandlerTable {
    entries: BTreeMap<String, Arc<dyn Handler>>,
}

impl HandlerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` under `name`, builder style.
    pub fn with(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.entries.insert(name.into(), Arc::new(handler));
        self
    }

    /// The handler registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.entries.get(name).cloned()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Reads every command manifest under `<root>/commands`, in file-name order.
/// A missing directory yields no commands.
pub fn discover(root: &Path, handlers: &HandlerTable) -> Result<Vec<CommandDefinition>> {
    let dir = root.join(COMMANDS_DIR);
    if !dir.is_dir() {
        log::debug!("No commands directory at '{}'", dir.display());
        return Ok(Vec::new());
    }

    let mut definitions = Vec::new();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other(format!("cannot walk '{}'", dir.display()))
            }))
        })?;
        let path = entry.path();
        let is_manifest = entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION);
        if !is_manifest {
            continue;
        }

        let Some(name_path) = command_path(&dir, path) else {
            log::warn!("Skipping '{}': it does not name a command", path.display());
            continue;
        };
        log::debug!("Loading command {:?} from '{}'", name_path, path.display());
        definitions.push(load_manifest(path, name_path, handlers)?);
    }
    Ok(definitions)
}

/// The command path for a manifest file, relative to the commands directory.
fn command_path(dir: &Path, file: &Path) -> Option<Vec<String>> {
    let relative = file.strip_prefix(dir).ok()?;
    let mut segments: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let stem = file.file_stem()?.to_string_lossy();
    if stem != INDEX_MANIFEST_STEM {
        segments.push(stem.into_owned());
    }
    if segments.is_empty() { None } else { Some(segments) }
}

fn load_manifest(
    path: &Path,
    name_path: Vec<String>,
    handlers: &HandlerTable,
) -> Result<CommandDefinition> {
    let content = fs::read_to_string(path)?;
    let manifest: CommandManifest = toml::from_str(&content).map_err(|e| Error::Manifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let manifest_error = |message: String| Error::Manifest {
        path: path.to_path_buf(),
        message,
    };

    let handler: Arc<dyn Handler> = match (manifest.handler, manifest.run) {
        (Some(name), None) => handlers
            .get(&name)
            .ok_or_else(|| manifest_error(format!("unknown handler '{}'", name)))?,
        (None, Some(line)) => Arc::new(ScriptHandler::new(line)),
        (Some(_), Some(_)) => {
            return Err(manifest_error("`handler` and `run` are mutually exclusive".into()));
        }
        (None, None) => {
            return Err(manifest_error("expected a `handler` or a `run` line".into()));
        }
    };

    let options = option_schema::specs_from_table(&manifest.options).map_err(|e| match e {
        Error::Configuration(message) => manifest_error(message),
        other => other,
    })?;

    let mut definition = CommandDefinition::with_handler(name_path, handler);
    definition.description = manifest.description;
    definition.usage = manifest.usage;
    definition.options = options;
    for name in manifest.middleware {
        definition = definition.use_named(name);
    }
    for (name, line) in manifest.methods {
        definition = definition.method(name, ScriptMiddleware::new(line));
    }
    Ok(definition)
}
