//! Dialogue configuration stored under `.dialogue/config.toml`.
//!
//! Relative directories in the file are relative to the directory holding
//! the file, so the default layout keeps everything under `.dialogue/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::SessionDefaults;
use crate::io::store::write_atomic;

pub const DEFAULT_CONFIG_PATH: &str = ".dialogue/config.toml";

/// Dialogue configuration (TOML).
///
/// Meant to be edited by hand. Missing fields fall back to the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DialogueConfig {
    /// Identity stamped onto newly created sessions.
    pub session: SessionDefaults,
    pub store: StoreConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON document per session.
    pub state_dir: PathBuf,
    /// Prepended to the session id to form the document name.
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("sessions"),
            key_prefix: "session-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("memory"),
        }
    }
}

impl DialogueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.store.state_dir.as_os_str().is_empty() {
            return Err(anyhow!("store.state_dir must be non-empty"));
        }
        if self.store.key_prefix.trim().is_empty() {
            return Err(anyhow!("store.key_prefix must be non-empty"));
        }
        if self.store.key_prefix.contains(['/', '\\']) {
            return Err(anyhow!("store.key_prefix must not contain path separators"));
        }
        if self.memory.enabled && self.memory.dir.as_os_str().is_empty() {
            return Err(anyhow!("memory.dir must be non-empty when memory is enabled"));
        }
        Ok(())
    }

    /// Resolve relative directories against `base`; absolute ones are kept.
    pub fn resolved(&self, base: &Path) -> Self {
        let mut cfg = self.clone();
        cfg.store.state_dir = base.join(&self.store.state_dir);
        cfg.memory.dir = base.join(&self.memory.dir);
        cfg
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DialogueConfig::default()`.
pub fn load_config(path: &Path) -> Result<DialogueConfig> {
    if !path.exists() {
        let cfg = DialogueConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DialogueConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// [`load_config`] with directories resolved against the config file's directory.
pub fn load_resolved_config(path: &Path) -> Result<DialogueConfig> {
    let base = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(load_config(path)?.resolved(base))
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DialogueConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
