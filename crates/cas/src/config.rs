//! Store configuration with environment variable and file-based loading.
//!
//! Environment variables:
//! - `CAS_PATH`: Root path of the store
//! - `CAS_ALGORITHM`: `sha256` (default) or `blake3`
//!
//! Default path: `~/.cas/store`
//!
//! `force` is never read from the environment or a file. Wiping a store has
//! to be asked for in code via [`CasConfig::with_force`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::hash::HashAlgorithm;

/// Configuration for opening a [`FileStore`](crate::FileStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasConfig {
    /// Root of the store; the 256 shard directories live directly under it.
    pub base_path: PathBuf,

    /// Build the shard layout if the root is missing or incomplete.
    /// When false, opening a non-store fails with `StoreNotValid`.
    #[serde(default = "default_true")]
    pub create: bool,

    /// Delete everything at `base_path` before opening.
    #[serde(skip)]
    pub force: bool,

    /// Digest function used to derive keys.
    #[serde(default)]
    pub algorithm: HashAlgorithm,
}

fn default_true() -> bool {
    true
}

impl Default for CasConfig {
    fn default() -> Self {
        Self::with_base_path(default_cas_path())
    }
}

/// Get the default store path (~/.cas/store).
fn default_cas_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".cas").join("store"))
        .unwrap_or_else(|| PathBuf::from(".cas/store"))
}

impl CasConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let base_path = env::var("CAS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cas_path());

        let algorithm = match env::var("CAS_ALGORITHM") {
            Ok(name) => name
                .parse()
                .with_context(|| format!("invalid CAS_ALGORITHM: {}", name))?,
            Err(_) => HashAlgorithm::default(),
        };

        Ok(Self::with_base_path(base_path).with_algorithm(algorithm))
    }

    /// Load configuration from a TOML file, falling back to environment.
    ///
    /// The file should contain a `[cas]` section:
    /// ```toml
    /// [cas]
    /// base_path = "/srv/cas"
    /// create = true
    /// algorithm = "sha256"
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        if let Some(cas_section) = table.get("cas") {
            let config: CasConfig = cas_section
                .clone()
                .try_into()
                .context("failed to parse [cas] section")?;
            Ok(config)
        } else {
            Self::from_env()
        }
    }

    /// Config for a specific root, creating the layout if needed.
    pub fn with_base_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            create: true,
            force: false,
            algorithm: HashAlgorithm::default(),
        }
    }

    /// Config that only attaches to a store that already exists at `path`.
    pub fn existing(path: impl Into<PathBuf>) -> Self {
        Self {
            create: false,
            ..Self::with_base_path(path)
        }
    }

    /// Wipe whatever is at the root before opening. Destroys data.
    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}
