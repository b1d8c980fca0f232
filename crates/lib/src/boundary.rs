//! Package ownership of the directory tree.
//!
//! Every directory belongs to the nearest enclosing directory that is a live
//! package. A label `//e:f/g` is only valid while `e/f` is not itself a
//! package; otherwise the path belongs to `//e/f:g` and the label "crosses
//! the boundary" of subpackage `e/f`. Deleted packages are not packages
//! here, so their directories fall back to the nearest surviving ancestor.

use std::fmt;
use std::path::PathBuf;

use tracing::trace;

use crate::label::{Label, PackageId};
use crate::locator::{PackageLookup, PackageLookupValue};

/// What to suggest when a label crosses a subpackage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingHint {
  /// The colon is in the wrong place.
  MisplacedColon,
  /// The subpackage lives under a different package-path root than the
  /// owning package, which usually means it was deleted from the owner's root.
  DeletedPackage,
}

/// A label whose path reaches into a deeper package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryCrossing {
  pub label: Label,
  pub subpackage: PackageId,
  /// The same path, owned by `subpackage`.
  pub corrected: Label,
  /// Descriptor file of the subpackage.
  pub subpackage_build_file: PathBuf,
  pub hint: CrossingHint,
}

impl fmt::Display for BoundaryCrossing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Label '{}' crosses boundary of subpackage '{}' ",
      self.label, self.subpackage
    )?;
    match self.hint {
      CrossingHint::MisplacedColon => write!(f, "(perhaps you meant to put the colon here: '{}'?)", self.corrected),
      CrossingHint::DeletedPackage => {
        let file_name = self
          .subpackage_build_file
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .unwrap_or_else(|| "BUILD".to_string());
        write!(
          f,
          "(have you deleted {}/{}? If so, use the --deleted_packages={} option)",
          self.subpackage, file_name, self.subpackage
        )
      }
    }
  }
}

impl std::error::Error for BoundaryCrossing {}

pub struct PackageBoundaryValidator<'a> {
  lookup: &'a dyn PackageLookup,
}

impl<'a> PackageBoundaryValidator<'a> {
  pub fn new(lookup: &'a dyn PackageLookup) -> Self {
    Self { lookup }
  }

  /// The package owning the file at workspace-relative `path`: the longest
  /// directory prefix of it that is a live package.
  pub fn owning_package(&self, path: &str) -> Option<PackageId> {
    let mut dir = match path.rsplit_once('/') {
      Some((dir, _)) => PackageId::new(dir).ok(),
      None => Some(PackageId::root()),
    };
    while let Some(candidate) = dir {
      if self.lookup.lookup(&candidate).is_package() {
        return Some(candidate);
      }
      dir = candidate.parent();
    }
    None
  }

  /// Fails if a directory inside `label`'s name is a package of its own.
  /// The deepest such package is reported.
  pub fn check(&self, label: &Label) -> Result<(), BoundaryCrossing> {
    let segments: Vec<&str> = label.name().split('/').collect();
    for depth in (1..segments.len()).rev() {
      let Ok(subpackage) = label.package().child(&segments[..depth].join("/")) else {
        continue;
      };
      let PackageLookupValue::Found(sub_location) = self.lookup.lookup(&subpackage) else {
        continue;
      };
      let Ok(corrected) = Label::new(subpackage.clone(), &segments[depth..].join("/")) else {
        continue;
      };

      let hint = match self.lookup.lookup(label.package()) {
        PackageLookupValue::Found(owner) if owner.root != sub_location.root => CrossingHint::DeletedPackage,
        _ => CrossingHint::MisplacedColon,
      };
      trace!(%label, %subpackage, "label crosses subpackage boundary");
      return Err(BoundaryCrossing {
        label: label.clone(),
        subpackage,
        corrected,
        subpackage_build_file: sub_location.path,
        hint,
      });
    }
    Ok(())
  }
}
