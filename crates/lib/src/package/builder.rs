use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{FileKind, FileTarget, Package, Rule, Target};
use crate::events::Event;
use crate::label::{Label, PackageId};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Mutable staging area for a [`Package`]; only the loader creates one.
pub(crate) struct PackageBuilder {
  id: PackageId,
  build_file: PathBuf,
  source_root: PathBuf,
  targets: BTreeMap<String, Arc<Target>>,
  features: Vec<String>,
  events: Vec<Event>,
}

impl PackageBuilder {
  pub(crate) fn new(id: PackageId, build_file: PathBuf, source_root: PathBuf) -> Self {
    Self {
      id,
      build_file,
      source_root,
      targets: BTreeMap::new(),
      features: Vec::new(),
      events: Vec::new(),
    }
  }

  pub(crate) fn id(&self) -> &PackageId {
    &self.id
  }

  pub(crate) fn build_file(&self) -> &PathBuf {
    &self.build_file
  }

  pub(crate) fn set_features(&mut self, features: Vec<String>) {
    self.features = features;
  }

  pub(crate) fn features(&self) -> &[String] {
    &self.features
  }

  pub(crate) fn has_target(&self, name: &str) -> bool {
    self.targets.contains_key(name)
  }

  /// Adds `rule`, or hands it back if its name is taken.
  pub(crate) fn add_rule(&mut self, rule: Rule) -> Result<(), Rule> {
    let name = rule.label.name().to_string();
    if self.targets.contains_key(&name) {
      return Err(rule);
    }
    self.targets.insert(name, Arc::new(Target::Rule(rule)));
    Ok(())
  }

  /// Adds a file target unless a target of that name already exists. Returns
  /// whether the target was added.
  pub(crate) fn add_file(&mut self, label: Label, kind: FileKind) -> bool {
    if self.targets.contains_key(label.name()) {
      return false;
    }
    self.targets.insert(
      label.name().to_string(),
      Arc::new(Target::File(FileTarget { label, kind })),
    );
    true
  }

  pub(crate) fn target(&self, name: &str) -> Option<&Target> {
    self.targets.get(name).map(|t| t.as_ref())
  }

  pub(crate) fn add_event(&mut self, event: Event) {
    self.events.push(event);
  }

  pub(crate) fn add_events(&mut self, events: impl IntoIterator<Item = Event>) {
    self.events.extend(events);
  }

  pub(crate) fn finish(self) -> Package {
    let contains_errors = self.events.iter().any(Event::is_error);
    Package {
      id: self.id,
      build_file: self.build_file,
      source_root: self.source_root,
      targets: self.targets,
      features: self.features,
      contains_errors,
      events: self.events,
      generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
    }
  }
}
