//! Loaded packages and their targets.
//!
//! A [`Package`] is immutable once the loader has built it. A change to its
//! descriptor file produces a new `Package` with a new generation number; it
//! never edits an existing one.

mod builder;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub(crate) use builder::PackageBuilder;

use crate::attrs::{AttrType, AttributeMapper, AttributeValue};
use crate::error::PackageError;
use crate::events::{Event, Location};
use crate::label::{Label, PackageId};

/// One attribute of a rule, as declared by its rule class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleAttribute {
  pub(crate) name: String,
  pub(crate) ty: AttrType,
  pub(crate) value: Option<AttributeValue>,
  pub(crate) explicit: bool,
}

impl RuleAttribute {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Declared type; independent of whether the value is configurable.
  pub fn ty(&self) -> AttrType {
    self.ty
  }

  /// `None` for an optional attribute without a default that the rule left unset.
  pub fn value(&self) -> Option<&AttributeValue> {
    self.value.as_ref()
  }

  /// Whether the descriptor file set this attribute (as opposed to a default).
  pub fn is_explicit(&self) -> bool {
    self.explicit
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
  pub(crate) label: Label,
  pub(crate) kind: String,
  pub(crate) location: Location,
  pub(crate) attributes: Vec<RuleAttribute>,
  pub(crate) features: Vec<String>,
}

impl Rule {
  pub fn label(&self) -> &Label {
    &self.label
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  pub fn location(&self) -> &Location {
    &self.location
  }

  /// Attributes in rule-class declaration order.
  pub fn attributes(&self) -> &[RuleAttribute] {
    &self.attributes
  }

  pub fn attribute(&self, name: &str) -> Option<&RuleAttribute> {
    self.attributes.iter().find(|a| a.name == name)
  }

  /// Package-level features in effect for this rule.
  pub fn features(&self) -> &[String] {
    &self.features
  }

  /// Raw view of the attributes; see [`AttributeMapper`].
  pub fn mapper(&self) -> AttributeMapper<'_> {
    AttributeMapper::of(self)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
  Source,
  /// Declared as an output of `rule`.
  Generated { rule: Label },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
  pub(crate) label: Label,
  pub(crate) kind: FileKind,
}

impl FileTarget {
  pub fn label(&self) -> &Label {
    &self.label
  }

  pub fn kind(&self) -> &FileKind {
    &self.kind
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
  File(FileTarget),
  Rule(Rule),
}

impl Target {
  pub fn label(&self) -> &Label {
    match self {
      Target::File(file) => &file.label,
      Target::Rule(rule) => &rule.label,
    }
  }

  pub fn as_rule(&self) -> Option<&Rule> {
    match self {
      Target::Rule(rule) => Some(rule),
      Target::File(_) => None,
    }
  }

  pub fn kind_name(&self) -> String {
    match self {
      Target::File(FileTarget {
        kind: FileKind::Source, ..
      }) => "source file".to_string(),
      Target::File(FileTarget {
        kind: FileKind::Generated { .. },
        ..
      }) => "generated file".to_string(),
      Target::Rule(rule) => format!("{} rule", rule.kind),
    }
  }
}

#[derive(Debug)]
pub struct Package {
  pub(crate) id: PackageId,
  pub(crate) build_file: PathBuf,
  pub(crate) source_root: PathBuf,
  pub(crate) targets: BTreeMap<String, Arc<Target>>,
  pub(crate) features: Vec<String>,
  pub(crate) contains_errors: bool,
  pub(crate) events: Vec<Event>,
  pub(crate) generation: u64,
}

impl Package {
  pub fn id(&self) -> &PackageId {
    &self.id
  }

  pub fn name(&self) -> &str {
    self.id.as_str()
  }

  /// The descriptor file this package was loaded from.
  pub fn build_file(&self) -> &Path {
    &self.build_file
  }

  /// The package-path entry the descriptor file was found under.
  pub fn source_root(&self) -> &Path {
    &self.source_root
  }

  pub fn targets(&self) -> &BTreeMap<String, Arc<Target>> {
    &self.targets
  }

  pub fn target(&self, name: &str) -> Result<&Arc<Target>, PackageError> {
    self.targets.get(name).ok_or_else(|| PackageError::TargetNotFound {
      label: format!("//{}:{}", self.id, name),
      name: name.to_string(),
      package: self.id.to_string(),
      build_file: self.build_file.clone(),
    })
  }

  pub fn features(&self) -> &[String] {
    &self.features
  }

  /// Whether loading recorded any error event. Such a package is still usable
  /// but may be missing targets.
  pub fn contains_errors(&self) -> bool {
    self.contains_errors
  }

  pub fn events(&self) -> &[Event] {
    &self.events
  }

  /// Process-wide unique number of the load that produced this package. Two
  /// lookups returned the same package iff their generations are equal.
  pub fn generation(&self) -> u64 {
    self.generation
  }
}
