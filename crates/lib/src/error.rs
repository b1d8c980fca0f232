//! Errors raised by package and target lookups.

use std::path::PathBuf;

use thiserror::Error;

use crate::boundary::BoundaryCrossing;
use crate::label::PackageId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundReason {
  #[error("BUILD file not found on package path")]
  NoBuildFile,

  #[error("Package is considered deleted due to --deleted_packages")]
  Deleted,

  #[error("{0}")]
  InvalidName(String),
}

/// Failure of a package or target lookup. Package-level variants are
/// memoized by the cache for the rest of the epoch, so the type is `Clone`
/// and I/O failures are kept as their message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageError {
  #[error("no such package '{package}': {reason}")]
  NotFound { package: String, reason: NotFoundReason },

  #[error("error loading package '{package}': {} ({message})", .path.display())]
  Content {
    package: String,
    path: PathBuf,
    message: String,
  },

  #[error(
    "no such target '{label}': target '{name}' not declared in package '{package}' defined by {}",
    .build_file.display()
  )]
  TargetNotFound {
    label: String,
    name: String,
    package: String,
    build_file: PathBuf,
  },

  #[error(transparent)]
  CrossesSubpackageBoundary(#[from] BoundaryCrossing),

  #[error("package '{package}' contains errors")]
  ContainsErrors { package: String },

  #[error("loading package '{package}' was interrupted: {message}")]
  Interrupted { package: String, message: String },
}

impl PackageError {
  pub(crate) fn not_found(package: &PackageId, reason: NotFoundReason) -> Self {
    PackageError::NotFound {
      package: package.to_string(),
      reason,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, PackageError::NotFound { .. })
  }
}
