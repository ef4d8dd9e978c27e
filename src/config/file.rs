//! Configuration file discovery and decoding.
//!
//! Two file layers feed the resolver: a per-user file at the conventional
//! user-config location and a project file found in the working directory.
//! Project candidates are probed in a fixed order and the first hit wins:
//!
//! 1. `.printeerrc.json`
//! 2. `printeer.config.json` / `printeer.config.yaml` / `printeer.config.yml`
//! 3. `config.json`
//!
//! JSON and YAML are both accepted; the extension picks the decoder.
//! Decoding errors are schema errors (fatal); read errors are I/O errors
//! the resolver downgrades to a skipped layer with a warning.

use std::path::{Path, PathBuf};

use super::overlay::ConfigOverlay;
use crate::error::{PrinteerError, Result};

/// Project-level candidate file names, probed in order.
pub const PROJECT_FILES: &[&str] = &[
    ".printeerrc.json",
    "printeer.config.json",
    "printeer.config.yaml",
    "printeer.config.yml",
    "config.json",
];

/// The per-user configuration file, if the platform conventions resolve.
///
/// `$XDG_CONFIG_HOME/printeer/config.json`, falling back to
/// `~/.config/printeer/config.json`; `%APPDATA%\printeer\config.json` on
/// Windows. Only returned when the file actually exists.
pub fn user_config_path() -> Option<PathBuf> {
    let base = if cfg!(windows) {
        std::env::var_os("APPDATA").map(PathBuf::from)?
    } else if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg)
    } else {
        let home = std::env::var_os("HOME").map(PathBuf::from)?;
        home.join(".config")
    };
    let path = base.join("printeer").join("config.json");
    path.is_file().then_some(path)
}

/// The first existing project config file under `dir`.
pub fn project_config_path(dir: &Path) -> Option<PathBuf> {
    PROJECT_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// All config files that currently exist, lowest precedence first.
///
/// This is also the watch list for hot reload.
pub fn discover(dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(user) = user_config_path() {
        paths.push(user);
    }
    if let Some(project) = project_config_path(dir) {
        paths.push(project);
    }
    paths
}

/// Decode one config file into an overlay.
///
/// # Errors
///
/// - [`PrinteerError::ConfigIo`] when the file cannot be read.
/// - [`PrinteerError::Schema`] when the content does not decode into the
///   known shape (including unknown fields).
pub fn load_file(path: &Path) -> Result<ConfigOverlay> {
    let content = std::fs::read_to_string(path).map_err(|e| PrinteerError::ConfigIo {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&content)
            .map_err(|e| PrinteerError::Schema(format!("{}: {e}", path.display())))
    } else {
        serde_json::from_str(&content)
            .map_err(|e| PrinteerError::Schema(format!("{}: {e}", path.display())))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
