//! Finding descriptor files on the package path.
//!
//! A [`PackageLocator`] is an immutable snapshot of the package path (roots
//! searched in order, first match wins) and the deleted-packages override.
//! The cache holds one per epoch and only swaps it at `sync()`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::label::{LabelError, PackageId};
use crate::options::PackageCacheOptions;

/// Where a package's descriptor file was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildFileLocation {
  /// The package-path entry containing the package.
  pub root: PathBuf,
  /// Full path of the descriptor file.
  pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLookupValue {
  Found(BuildFileLocation),
  NotFound,
  /// Listed in the deleted-packages set; its descriptor file is ignored.
  Deleted,
}

impl PackageLookupValue {
  pub fn is_package(&self) -> bool {
    matches!(self, PackageLookupValue::Found(_))
  }

  pub fn location(&self) -> Option<&BuildFileLocation> {
    match self {
      PackageLookupValue::Found(location) => Some(location),
      _ => None,
    }
  }
}

/// Answers "is this a package, and where is its descriptor file?".
pub trait PackageLookup {
  fn lookup(&self, id: &PackageId) -> PackageLookupValue;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLocator {
  roots: Vec<PathBuf>,
  deleted: BTreeSet<PackageId>,
  build_file_name: String,
}

impl PackageLocator {
  pub fn new(roots: Vec<PathBuf>, build_file_name: impl Into<String>) -> Self {
    Self {
      roots,
      deleted: BTreeSet::new(),
      build_file_name: build_file_name.into(),
    }
  }

  pub fn from_options(options: &PackageCacheOptions) -> Result<Self, LabelError> {
    let deleted = options
      .deleted_packages
      .iter()
      .map(|name| PackageId::new(name))
      .collect::<Result<_, _>>()?;
    Ok(Self {
      roots: options.package_path.clone(),
      deleted,
      build_file_name: options.build_file_name.clone(),
    })
  }

  pub fn with_deleted(mut self, deleted: impl IntoIterator<Item = PackageId>) -> Self {
    self.deleted = deleted.into_iter().collect();
    self
  }

  pub fn with_roots(mut self, roots: Vec<PathBuf>) -> Self {
    self.roots = roots;
    self
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }

  pub fn deleted(&self) -> &BTreeSet<PackageId> {
    &self.deleted
  }

  pub fn build_file_name(&self) -> &str {
    &self.build_file_name
  }

  /// Same roots in the same order and same descriptor file name; only the
  /// deleted set may differ.
  pub fn same_search_path(&self, other: &PackageLocator) -> bool {
    self.roots == other.roots && self.build_file_name == other.build_file_name
  }

  /// Packages deleted in exactly one of the two locators.
  pub fn deletion_changes(&self, other: &PackageLocator) -> BTreeSet<PackageId> {
    self.deleted.symmetric_difference(&other.deleted).cloned().collect()
  }

  pub fn is_deleted(&self, id: &PackageId) -> bool {
    self.deleted.contains(id)
  }

  /// Every path at which `id`'s descriptor file could live, in search order.
  pub fn candidates(&self, id: &PackageId) -> Vec<PathBuf> {
    self.roots.iter().map(|root| self.build_file_in(root, id)).collect()
  }

  fn build_file_in(&self, root: &Path, id: &PackageId) -> PathBuf {
    root.join(id.relative_path()).join(&self.build_file_name)
  }

  /// Search the roots in order. Touches the filesystem on every call.
  pub fn locate(&self, id: &PackageId) -> PackageLookupValue {
    if self.is_deleted(id) {
      return PackageLookupValue::Deleted;
    }
    for root in &self.roots {
      let path = self.build_file_in(root, id);
      if path.is_file() {
        trace!(package = %id, path = %path.display(), "found descriptor file");
        return PackageLookupValue::Found(BuildFileLocation {
          root: root.clone(),
          path,
        });
      }
    }
    PackageLookupValue::NotFound
  }
}

impl PackageLookup for PackageLocator {
  fn lookup(&self, id: &PackageId) -> PackageLookupValue {
    self.locate(id)
  }
}
