// src/core/config_loader.rs

//! # Config Loader
//!
//! Reads the optional `cli.toml` at a program root and resolves the paths it
//! names. A missing file yields the defaults.

use crate::{
    constants::PROGRAM_CONFIG_FILENAME,
    error::{Error, Result},
    models::ProgramConfig,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Loads `<root>/cli.toml`. A relative `path` inside it is resolved against `root`.
pub fn load_program_config(root: &Path) -> Result<ProgramConfig> {
    let config_path = root.join(PROGRAM_CONFIG_FILENAME);
    if !config_path.is_file() {
        log::debug!("No '{}' under '{}'; using defaults", PROGRAM_CONFIG_FILENAME, root.display());
        return Ok(ProgramConfig {
            path: Some(root.to_path_buf()),
            ..ProgramConfig::default()
        });
    }

    log::debug!("Loading program config from '{}'", config_path.display());
    let content = fs::read_to_string(&config_path)?;
    let mut config: ProgramConfig = toml::from_str(&content).map_err(|e| Error::Manifest {
        path: config_path.clone(),
        message: e.to_string(),
    })?;

    config.path = Some(match config.path.take() {
        Some(path) => {
            let expanded = expand_path(&path.to_string_lossy())?;
            if expanded.is_absolute() {
                expanded
            } else {
                root.join(expanded)
            }
        }
        None => root.to_path_buf(),
    });
    Ok(config)
}

/// Expands `~` and environment variables in `template`.
pub fn expand_path(template: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(template)
        .map_err(|e| Error::Configuration(format!("cannot expand path '{}': {}", template, e)))?;
    Ok(dunce::simplified(Path::new(expanded.as_ref())).to_path_buf())
}

/// The executable's file stem, used when no program name is configured.
pub fn default_program_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
