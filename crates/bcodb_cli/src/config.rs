//! CLI configuration loading.
//!
//! # Responsibility
//! - Load TOML configuration with sensible defaults for every field.
//! - Keep the config surface small: storage path, registry root, logging.
//!
//! # Invariants
//! - An explicitly passed config path must exist; the default path is
//!   optional and silently falls back to defaults.
//! - Unknown keys are rejected so typos do not silently disable settings.

use anyhow::{bail, Context};
use bcodb_core::DEFAULT_REGISTRY_ROOT;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "bcodb.toml";
const DEFAULT_DB_PATH: &str = "bcodb.sqlite3";

/// Configuration for the `bcodb` binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CliConfig {
    /// SQLite database file the commands operate on.
    pub db_path: PathBuf,
    /// Registry root minted into new object identifiers.
    pub registry_root: String,
    /// Directory for rolling file logs. File logging is off when unset.
    pub log_dir: Option<PathBuf>,
    /// Log level for file logs; defaults per build mode when unset.
    pub log_level: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            registry_root: DEFAULT_REGISTRY_ROOT.to_string(),
            log_dir: None,
            log_level: None,
        }
    }
}

impl CliConfig {
    /// Loads configuration from `path`, or from `bcodb.toml` in the working
    /// directory when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(explicit) => {
                if !explicit.exists() {
                    bail!("config file `{}` does not exist", explicit.display());
                }
                Self::from_file(explicit)
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file `{}`", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file `{}`", path.display()))
    }
}
