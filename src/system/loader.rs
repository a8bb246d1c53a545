// src/system/loader.rs

use crate::{
    constants::{MANIFEST_EXTENSION, MIDDLEWARE_DIR},
    core::pipeline::Middleware,
    error::{Error, Result},
    models::MiddlewareManifest,
    system::script::ScriptMiddleware,
};
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Resolves middleware by name when a command does not define it itself.
pub trait MiddlewareLoader: Send + Sync + fmt::Debug {
    /// Loads the middleware called `name`.
    ///
    /// # Errors
    /// [`Error::ModuleNotFound`] if nothing by that name exists.
    fn load(&self, name: &str) -> Result<Arc<dyn Middleware>>;
}

/// An in-memory set of named middleware.
#[derive(Default, Clone)]
pub struct StaticLoader {
    entries: BTreeMap<String, Arc<dyn Middleware>>,
}

impl StaticLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `middleware` under `name`, builder style.
    pub fn with(mut self, name: impl Into<String>, middleware: impl Middleware + 'static) -> Self {
        self.insert(name, Arc::new(middleware));
        self
    }

    /// Adds `middleware` under `name`.
    pub fn insert(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
        self.entries.insert(name.into(), middleware);
    }
}

impl fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticLoader")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MiddlewareLoader for StaticLoader {
    fn load(&self, name: &str) -> Result<Arc<dyn Middleware>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }
}

/// Loads middleware from `<root>/middleware`.
///
/// `<name>.toml` is a manifest whose `run` line becomes the middleware;
/// otherwise a file called `<name>` is run directly, with the positionals
/// as its arguments.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    dir: PathBuf,
}

impl DirectoryLoader {
    /// A loader for the `middleware` directory under `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(MIDDLEWARE_DIR),
        }
    }
}

impl MiddlewareLoader for DirectoryLoader {
    fn load(&self, name: &str) -> Result<Arc<dyn Middleware>> {
        let is_plain_name = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !is_plain_name {
            return Err(Error::ModuleNotFound(name.to_string()));
        }

        let manifest_path = self.dir.join(format!("{}.{}", name, MANIFEST_EXTENSION));
        if manifest_path.is_file() {
            log::debug!("Loading middleware manifest '{}'", manifest_path.display());
            let content = fs::read_to_string(&manifest_path)?;
            let manifest: MiddlewareManifest =
                toml::from_str(&content).map_err(|e| Error::Manifest {
                    path: manifest_path.clone(),
                    message: e.to_string(),
                })?;
            return Ok(Arc::new(ScriptMiddleware::new(manifest.run)));
        }

        let executable = self.dir.join(name);
        if executable.is_file() {
            log::debug!("Using middleware executable '{}'", executable.display());
            let path = dunce::simplified(&executable).to_string_lossy().into_owned();
            let quoted = shlex::try_quote(&path)
                .map_err(|e| Error::Configuration(format!("middleware path '{}': {}", path, e)))?;
            // Executables receive the command's positionals as arguments.
            return Ok(Arc::new(ScriptMiddleware::new(format!("{} {{args}}", quoted))));
        }

        Err(Error::ModuleNotFound(name.to_string()))
    }
}

/// Tries several loaders in order.
#[derive(Debug, Default)]
pub struct ChainLoader {
    loaders: Vec<Box<dyn MiddlewareLoader>>,
}

impl ChainLoader {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a loader, builder style.
    pub fn then(mut self, loader: impl MiddlewareLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }
}

impl MiddlewareLoader for ChainLoader {
    fn load(&self, name: &str) -> Result<Arc<dyn Middleware>> {
        for loader in &self.loaders {
            match loader.load(name) {
                Err(Error::ModuleNotFound(_)) => continue,
                other => return other,
            }
        }
        Err(Error::ModuleNotFound(name.to_string()))
    }
}
