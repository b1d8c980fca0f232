//! Package identifiers and target labels.
//!
//! A [`PackageId`] is a normalized, slash-separated path relative to a package
//! root (`""` names the root package). A [`Label`] pairs a package with a target
//! name, written `//pkg/path:name`. Target names may contain slashes, in which
//! case they refer to paths below the package directory.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Condition key that matches when no explicit condition of a `select()` does.
pub const DEFAULT_CONDITION_KEY: &str = "//conditions:default";

/// Errors produced while parsing package names and labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
  #[error("Invalid package name '{name}': {reason}")]
  InvalidPackageName { name: String, reason: &'static str },

  #[error("invalid target name '{name}': {reason}")]
  InvalidTargetName { name: String, reason: &'static str },

  #[error("invalid label '{label}': {reason}")]
  InvalidLabel { label: String, reason: &'static str },
}

/// Normalized name of a package, unique within the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(Arc<str>);

impl PackageId {
  /// Validate and wrap a package name such as `foo/bar`.
  pub fn new(name: &str) -> Result<Self, LabelError> {
    validate_package_name(name)?;
    Ok(Self(Arc::from(name)))
  }

  /// The root package (a descriptor file directly under a package root).
  pub fn root() -> Self {
    Self(Arc::from(""))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_root(&self) -> bool {
    self.0.is_empty()
  }

  /// Directory of this package relative to a package root.
  pub fn relative_path(&self) -> PathBuf {
    PathBuf::from(&*self.0)
  }

  /// The package named by appending `relative` to this one.
  pub fn child(&self, relative: &str) -> Result<Self, LabelError> {
    if self.is_root() {
      Self::new(relative)
    } else {
      Self::new(&format!("{}/{}", self.0, relative))
    }
  }

  /// The enclosing directory's package name, or `None` for the root package.
  pub fn parent(&self) -> Option<Self> {
    if self.is_root() {
      return None;
    }
    match self.0.rfind('/') {
      Some(idx) => Some(Self(Arc::from(&self.0[..idx]))),
      None => Some(Self::root()),
    }
  }
}

impl fmt::Display for PackageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

fn validate_package_name(name: &str) -> Result<(), LabelError> {
  let invalid = |reason| {
    Err(LabelError::InvalidPackageName {
      name: name.to_string(),
      reason,
    })
  };

  if name.is_empty() {
    return Ok(());
  }
  if name.starts_with('/') {
    return invalid("package names may not start with '/'");
  }
  if name.ends_with('/') {
    return invalid("package names may not end with '/'");
  }
  if name
    .chars()
    .any(|c| !(c.is_ascii_alphanumeric() || "/-._ +=,@~".contains(c)))
  {
    return invalid(
      "package names may contain only A-Z, a-z, 0-9, '/', '-', '.', ' ', '+', '=', ',', '@', '~' and '_'",
    );
  }
  for segment in name.split('/') {
    match segment {
      "" => return invalid("package names may not contain '//' path separators"),
      "." | ".." => return invalid("package names may not contain '.' or '..' segments"),
      _ => {}
    }
  }
  Ok(())
}

fn validate_target_name(name: &str) -> Result<(), LabelError> {
  let invalid = |reason| {
    Err(LabelError::InvalidTargetName {
      name: name.to_string(),
      reason,
    })
  };

  if name.is_empty() {
    return invalid("empty target name");
  }
  if name.starts_with('/') {
    return invalid("target names may not start with '/'");
  }
  if name.ends_with('/') {
    return invalid("target names may not end with '/'");
  }
  if name.contains(':') {
    return invalid("target names may not contain ':'");
  }
  if name.chars().any(|c| c.is_control()) {
    return invalid("target names may not contain control characters");
  }
  for segment in name.split('/') {
    match segment {
      "" => return invalid("target names may not contain '//' path separators"),
      "." | ".." => return invalid("target names may not contain '.' or '..' segments"),
      _ => {}
    }
  }
  Ok(())
}

/// A target inside a package: `//package:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
  package: PackageId,
  name: Arc<str>,
}

impl Label {
  pub fn new(package: PackageId, name: &str) -> Result<Self, LabelError> {
    validate_target_name(name)?;
    Ok(Self {
      package,
      name: Arc::from(name),
    })
  }

  /// Parse an absolute label: `//pkg:name`, or `//pkg` as shorthand for
  /// `//pkg:<last segment of pkg>`.
  pub fn parse(label: &str) -> Result<Self, LabelError> {
    let invalid = |reason| LabelError::InvalidLabel {
      label: label.to_string(),
      reason,
    };

    let rest = label.strip_prefix("//").ok_or_else(|| invalid("labels must start with '//'"))?;
    let (package, name) = match rest.split_once(':') {
      Some((package, name)) => (package, name),
      None => {
        let name = rest.rsplit('/').next().unwrap_or(rest);
        if name.is_empty() {
          return Err(invalid("a label without ':' must name a non-root package"));
        }
        (rest, name)
      }
    };

    let package = PackageId::new(package)?;
    Self::new(package, name)
  }

  /// Parse a label as written inside the descriptor file of `current`.
  ///
  /// Accepts absolute labels, `:name`, and bare `name` (a file or target of
  /// the current package).
  pub fn parse_relative(label: &str, current: &PackageId) -> Result<Self, LabelError> {
    if label.starts_with("//") {
      Self::parse(label)
    } else if let Some(name) = label.strip_prefix(':') {
      Self::new(current.clone(), name)
    } else {
      Self::new(current.clone(), label)
    }
  }

  /// The `//conditions:default` key of `select()`.
  pub fn default_condition() -> Self {
    Self {
      package: PackageId(Arc::from("conditions")),
      name: Arc::from("default"),
    }
  }

  pub fn is_default_condition(&self) -> bool {
    self.package.as_str() == "conditions" && &*self.name == "default"
  }

  pub fn package(&self) -> &PackageId {
    &self.package
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Workspace-relative path this label points at (`pkg/name`).
  pub fn path(&self) -> String {
    if self.package.is_root() {
      self.name.to_string()
    } else {
      format!("{}/{}", self.package, self.name)
    }
  }
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "//{}:{}", self.package, self.name)
  }
}
