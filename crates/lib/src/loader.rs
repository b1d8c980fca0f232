//! Turning one descriptor file into a [`Package`].
//!
//! Loading only fails outright when the descriptor file is missing, deleted
//! or unreadable. Everything else (evaluation errors, unknown rule kinds or
//! attributes, badly typed values, duplicate names, boundary crossings) is
//! recorded as an error event and the package is returned with
//! `contains_errors` set.

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::attrs::{AttrType, AttributeValue, Value};
use crate::boundary::PackageBoundaryValidator;
use crate::error::{NotFoundReason, PackageError};
use crate::eval::{BuildFileEvaluator, BuildFileSource, EvalOutput, LuaEvaluator, RawValue, RuleCall};
use crate::events::{Event, Location};
use crate::label::{Label, PackageId};
use crate::locator::{PackageLookup, PackageLookupValue};
use crate::package::{FileKind, Package, PackageBuilder, Rule, RuleAttribute};
use crate::schema::{CoercionError, NAME_ATTRIBUTE, RuleClassRegistry, RuleSchema, coerce};

pub struct PackageLoader {
  evaluator: Arc<dyn BuildFileEvaluator>,
  schema: Arc<dyn RuleSchema>,
  loads: AtomicUsize,
}

impl PackageLoader {
  pub fn new(evaluator: Arc<dyn BuildFileEvaluator>, schema: Arc<dyn RuleSchema>) -> Self {
    Self {
      evaluator,
      schema,
      loads: AtomicUsize::new(0),
    }
  }

  /// Lua descriptor files with the builtin rule classes.
  pub fn with_defaults() -> Self {
    Self::new(Arc::new(LuaEvaluator::new()), Arc::new(RuleClassRegistry::builtin()))
  }

  pub fn schema(&self) -> &dyn RuleSchema {
    self.schema.as_ref()
  }

  /// Number of times [`load`](Self::load) has been called.
  pub fn load_count(&self) -> usize {
    self.loads.load(Ordering::SeqCst)
  }

  /// Load package `id`. `lookup` locates its descriptor file and decides
  /// subpackage boundaries.
  ///
  /// # Arguments
  ///
  /// * `id` - Package to load
  /// * `lookup` - Package lookups for this load; every id it is asked about
  ///   becomes a dependency of the result
  ///
  /// # Returns
  ///
  /// The package, possibly with `contains_errors` set. Fails only when no
  /// descriptor file exists for `id` or it cannot be read.
  pub fn load(&self, id: &PackageId, lookup: &dyn PackageLookup) -> Result<Package, PackageError> {
    self.loads.fetch_add(1, Ordering::SeqCst);

    let location = match lookup.lookup(id) {
      PackageLookupValue::Found(location) => location,
      PackageLookupValue::NotFound => return Err(PackageError::not_found(id, NotFoundReason::NoBuildFile)),
      PackageLookupValue::Deleted => return Err(PackageError::not_found(id, NotFoundReason::Deleted)),
    };

    let content = fs::read(&location.path).map_err(|e| {
      warn!(package = %id, path = %location.path.display(), error = %e, "failed to read descriptor file");
      PackageError::Content {
        package: id.to_string(),
        path: location.path.clone(),
        message: e.to_string(),
      }
    })?;

    let rule_kinds = self.schema.rule_kinds();
    let source = BuildFileSource {
      package: id,
      path: &location.path,
      content: &content,
      rule_kinds: &rule_kinds,
    };
    let output = self.evaluator.evaluate(&source).unwrap_or_else(|err| EvalOutput {
      events: vec![Event::error(format!("{}: {}", location.path.display(), err))],
      ..Default::default()
    });

    let mut builder = PackageBuilder::new(id.clone(), location.path.clone(), location.root.clone());
    builder.add_events(output.events);
    builder.set_features(output.features);

    let validator = PackageBoundaryValidator::new(lookup);
    let mut inputs = Vec::new();
    for call in output.calls {
      self.add_rule(&mut builder, &validator, call, &mut inputs);
    }
    add_input_files(&mut builder, &validator, inputs);

    let package = builder.finish();
    debug!(
      package = %id,
      targets = package.targets().len(),
      contains_errors = package.contains_errors(),
      "loaded package"
    );
    Ok(package)
  }

  /// Build one rule and its output files. Same-package labels it references
  /// are appended to `inputs`; they become source files once every rule is in.
  fn add_rule(
    &self,
    builder: &mut PackageBuilder,
    validator: &PackageBoundaryValidator<'_>,
    call: RuleCall,
    inputs: &mut Vec<(Location, Label)>,
  ) {
    let location = Location::new(builder.build_file().clone(), call.line);
    let error = |message: String| Event::error(message).with_location(location.clone());

    let Some(class) = self.schema.rule_class(&call.kind) else {
      builder.add_event(error(format!("unknown rule kind '{}'", call.kind)));
      return;
    };

    let name = match call.arg(NAME_ATTRIBUTE) {
      Some(RawValue::String(name)) => name,
      Some(other) => {
        builder.add_event(error(format!(
          "{} rule: expected value of type 'string' for attribute 'name', but got {}",
          call.kind,
          other.type_name()
        )));
        return;
      }
      None => {
        builder.add_event(error(format!(
          "{} rule: missing value for mandatory attribute 'name'",
          call.kind
        )));
        return;
      }
    };
    let label = match Label::new(builder.id().clone(), name) {
      Ok(label) => label,
      Err(err) => {
        builder.add_event(error(err.to_string()));
        return;
      }
    };
    if let Err(crossing) = validator.check(&label) {
      builder.add_event(error(crossing.to_string()));
      return;
    }
    if let Some(existing) = builder.target(label.name()) {
      let message = format!(
        "{} rule '{}' in package '{}' conflicts with existing {}",
        call.kind,
        label.name(),
        builder.id(),
        existing.kind_name()
      );
      builder.add_event(error(message));
      return;
    }

    for (attribute, _) in &call.args {
      if class.attribute(attribute).is_none() {
        builder.add_event(error(format!(
          "{}: no such attribute '{}' in '{}' rule",
          label, attribute, call.kind
        )));
      }
    }

    let mut attributes = Vec::with_capacity(class.attributes().len());
    for spec in class.attributes() {
      let explicit = call.arg(spec.name()).map(|raw| coerce(spec.ty(), raw, builder.id()));
      let attribute = match explicit {
        Some(Ok(value)) => RuleAttribute {
          name: spec.name().to_string(),
          ty: spec.ty(),
          value: Some(value),
          explicit: true,
        },
        Some(Err(err)) => {
          let message = match err {
            CoercionError::WrongType { expected, found } => format!(
              "{}: expected value of type '{}' for attribute '{}' in '{}' rule, but got {}",
              label,
              expected,
              spec.name(),
              call.kind,
              found
            ),
            other => format!(
              "{}: invalid value for attribute '{}' in '{}' rule: {}",
              label,
              spec.name(),
              call.kind,
              other
            ),
          };
          builder.add_event(error(message));
          default_attribute(spec.name(), spec.ty(), spec.default_value())
        }
        None => {
          if spec.is_mandatory() {
            builder.add_event(error(format!(
              "{}: missing value for mandatory attribute '{}' in '{}' rule",
              label,
              spec.name(),
              call.kind
            )));
          }
          default_attribute(spec.name(), spec.ty(), spec.default_value())
        }
      };
      attributes.push(attribute);
    }

    let rule = Rule {
      label: label.clone(),
      kind: call.kind,
      location: location.clone(),
      attributes,
      features: builder.features().to_vec(),
    };

    let mut outputs = Vec::new();
    rule.mapper().visit_all_labels(|referenced, attribute| {
      if attribute.ty().is_output() {
        outputs.push(referenced.clone());
      } else if referenced.package() == label.package() {
        inputs.push((location.clone(), referenced.clone()));
      }
    });

    if builder.add_rule(rule).is_err() {
      return;
    }

    for output in outputs {
      if let Err(crossing) = validator.check(&output) {
        builder.add_event(error(crossing.to_string()));
        continue;
      }
      if let Some(existing) = builder.target(output.name()) {
        let message = format!(
          "generated file '{}' in rule '{}' conflicts with existing {}",
          output.name(),
          label.name(),
          existing.kind_name()
        );
        builder.add_event(error(message));
        continue;
      }
      builder.add_file(output, FileKind::Generated { rule: label.clone() });
    }
  }
}

fn default_attribute(name: &str, ty: AttrType, default: Option<Value>) -> RuleAttribute {
  RuleAttribute {
    name: name.to_string(),
    ty,
    value: default.map(AttributeValue::Plain),
    explicit: false,
  }
}

/// Add a source file target for every referenced label that is not already
/// a target. Labels crossing into a subpackage are reported at the
/// referencing rule instead.
fn add_input_files(builder: &mut PackageBuilder, validator: &PackageBoundaryValidator<'_>, inputs: Vec<(Location, Label)>) {
  let mut checked = HashSet::new();
  for (location, label) in inputs {
    if builder.has_target(label.name()) || !checked.insert(label.clone()) {
      continue;
    }
    match validator.check(&label) {
      Ok(()) => {
        builder.add_file(label, FileKind::Source);
      }
      Err(crossing) => builder.add_event(Event::error(crossing.to_string()).with_location(location)),
    }
  }
}
