//! Package cache configuration.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BUILD_FILE_NAME: &str = "BUILD";

#[derive(Debug, Error)]
pub enum OptionsError {
  #[error("failed to read options from {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid options: {0}")]
  Parse(#[from] serde_json::Error),
}

/// Settings the cache is built from. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageCacheOptions {
  /// Roots searched in order for descriptor files.
  pub package_path: Vec<PathBuf>,
  /// Packages treated as nonexistent regardless of the filesystem.
  pub deleted_packages: BTreeSet<String>,
  pub build_file_name: String,
  /// Concurrent package loads during transitive visits.
  pub parallelism: usize,
}

impl Default for PackageCacheOptions {
  fn default() -> Self {
    Self {
      package_path: Vec::new(),
      deleted_packages: BTreeSet::new(),
      build_file_name: DEFAULT_BUILD_FILE_NAME.to_string(),
      parallelism: std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4),
    }
  }
}

impl PackageCacheOptions {
  pub fn from_json(json: &str) -> Result<Self, OptionsError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn load(path: &Path) -> Result<Self, OptionsError> {
    let content = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&content)
  }

  pub fn to_json(&self) -> Result<String, OptionsError> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}
