//! Rule classes and attribute coercion.
//!
//! A [`RuleSchema`] tells the loader which rule kinds exist and which
//! attributes each accepts. The loader converts the evaluator's untyped
//! [`RawValue`]s into typed [`AttributeValue`]s with [`coerce`].

use std::collections::BTreeMap;

use thiserror::Error;

use crate::attrs::{AttrType, AttributeError, AttributeValue, Selector, SelectorList, Value};
use crate::eval::RawValue;
use crate::label::{Label, LabelError, PackageId};

/// Name of the attribute every rule class carries.
pub const NAME_ATTRIBUTE: &str = "name";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
  name: String,
  ty: AttrType,
  default: Option<Value>,
  mandatory: bool,
}

impl AttributeSpec {
  pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
    Self {
      name: name.into(),
      ty,
      default: None,
      mandatory: false,
    }
  }

  pub fn mandatory(mut self) -> Self {
    self.mandatory = true;
    self
  }

  pub fn with_default(mut self, value: Value) -> Self {
    self.default = Some(value);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn ty(&self) -> AttrType {
    self.ty
  }

  pub fn is_mandatory(&self) -> bool {
    self.mandatory
  }

  /// The explicit default, else the type's implicit one.
  pub fn default_value(&self) -> Option<Value> {
    self.default.clone().or_else(|| Value::implicit_default(self.ty))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleClass {
  name: String,
  attributes: Vec<AttributeSpec>,
}

impl RuleClass {
  /// A class with only the implicit, mandatory `name` attribute.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      attributes: vec![AttributeSpec::new(NAME_ATTRIBUTE, AttrType::String).mandatory()],
    }
  }

  /// Declare another attribute. A later declaration of the same name
  /// replaces the earlier one.
  pub fn attr(mut self, spec: AttributeSpec) -> Self {
    match self.attributes.iter_mut().find(|a| a.name == spec.name) {
      Some(existing) => *existing = spec,
      None => self.attributes.push(spec),
    }
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Attributes in declaration order, `name` first.
  pub fn attributes(&self) -> &[AttributeSpec] {
    &self.attributes
  }

  pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
    self.attributes.iter().find(|a| a.name == name)
  }
}

pub trait RuleSchema: Send + Sync {
  fn rule_class(&self, kind: &str) -> Option<&RuleClass>;

  /// Every kind callable from a descriptor file.
  fn rule_kinds(&self) -> Vec<String>;
}

/// In-memory [`RuleSchema`].
#[derive(Debug, Clone, Default)]
pub struct RuleClassRegistry {
  classes: BTreeMap<String, RuleClass>,
}

impl RuleClassRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, class: RuleClass) -> &mut Self {
    self.classes.insert(class.name.clone(), class);
    self
  }

  /// A small set of general-purpose rule classes.
  pub fn builtin() -> Self {
    use AttrType::{Bool, LabelList, OutputList, StringList};

    let mut registry = Self::new();
    registry
      .register(
        RuleClass::new("filegroup")
          .attr(AttributeSpec::new("srcs", LabelList))
          .attr(AttributeSpec::new("data", LabelList)),
      )
      .register(
        RuleClass::new("cc_library")
          .attr(AttributeSpec::new("srcs", LabelList))
          .attr(AttributeSpec::new("hdrs", LabelList))
          .attr(AttributeSpec::new("deps", LabelList))
          .attr(AttributeSpec::new("copts", StringList))
          .attr(AttributeSpec::new("linkstatic", Bool)),
      )
      .register(
        RuleClass::new("sh_library")
          .attr(AttributeSpec::new("srcs", LabelList))
          .attr(AttributeSpec::new("deps", LabelList))
          .attr(AttributeSpec::new("data", LabelList)),
      )
      .register(
        RuleClass::new("sh_binary")
          .attr(AttributeSpec::new("srcs", LabelList))
          .attr(AttributeSpec::new("deps", LabelList))
          .attr(AttributeSpec::new("data", LabelList))
          .attr(AttributeSpec::new("args", StringList)),
      )
      .register(
        RuleClass::new("genrule")
          .attr(AttributeSpec::new("srcs", LabelList))
          .attr(AttributeSpec::new("tools", LabelList))
          .attr(AttributeSpec::new("outs", OutputList).mandatory())
          .attr(AttributeSpec::new("cmd", AttrType::String).mandatory()),
      );
    registry
  }
}

impl RuleSchema for RuleClassRegistry {
  fn rule_class(&self, kind: &str) -> Option<&RuleClass> {
    self.classes.get(kind)
  }

  fn rule_kinds(&self) -> Vec<String> {
    self.classes.keys().cloned().collect()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
  #[error("expected value of type '{expected}', but got {found}")]
  WrongType { expected: AttrType, found: &'static str },

  #[error("output '{0}' must be a file of the current package")]
  ForeignOutput(String),

  #[error(transparent)]
  Label(#[from] LabelError),

  #[error(transparent)]
  Select(#[from] AttributeError),
}

/// Convert `raw` into a value of type `ty`. Labels are resolved relative to
/// `package`; `select()`s become a [`SelectorList`] of that type.
pub fn coerce(ty: AttrType, raw: &RawValue, package: &PackageId) -> Result<AttributeValue, CoercionError> {
  match raw {
    RawValue::Select(raw_selectors) => {
      let mut selectors = Vec::with_capacity(raw_selectors.len());
      for raw_selector in raw_selectors {
        let mut entries = Vec::with_capacity(raw_selector.branches.len());
        for (condition, value) in &raw_selector.branches {
          entries.push((Label::parse_relative(condition, package)?, coerce_value(ty, value, package)?));
        }
        selectors.push(Selector::new(ty, entries)?);
      }
      Ok(AttributeValue::Configurable(SelectorList::new(selectors)?))
    }
    other => Ok(AttributeValue::Plain(coerce_value(ty, other, package)?)),
  }
}

fn coerce_value(ty: AttrType, raw: &RawValue, package: &PackageId) -> Result<Value, CoercionError> {
  let wrong_type = || CoercionError::WrongType {
    expected: ty,
    found: raw.type_name(),
  };

  let value = match (ty, raw) {
    (AttrType::Bool, RawValue::Bool(b)) => Value::Bool(*b),
    (AttrType::Bool, RawValue::Int(i @ (0 | 1))) => Value::Bool(*i == 1),
    (AttrType::Int, RawValue::Int(i)) => Value::Int(*i),
    (AttrType::String, RawValue::String(s)) => Value::String(s.clone()),
    (AttrType::StringList, RawValue::List(items)) => Value::StringList(
      items
        .iter()
        .map(|item| match item {
          RawValue::String(s) => Ok(s.clone()),
          _ => Err(wrong_type()),
        })
        .collect::<Result<_, _>>()?,
    ),
    (AttrType::Label, RawValue::String(s)) => Value::Label(Label::parse_relative(s, package)?),
    (AttrType::LabelList, RawValue::List(items)) => Value::LabelList(
      items
        .iter()
        .map(|item| match item {
          RawValue::String(s) => Label::parse_relative(s, package).map_err(CoercionError::from),
          _ => Err(wrong_type()),
        })
        .collect::<Result<_, _>>()?,
    ),
    (AttrType::Output, RawValue::String(s)) => Value::Output(output_label(s, package)?),
    (AttrType::OutputList, RawValue::List(items)) => Value::OutputList(
      items
        .iter()
        .map(|item| match item {
          RawValue::String(s) => output_label(s, package),
          _ => Err(wrong_type()),
        })
        .collect::<Result<_, _>>()?,
    ),
    _ => return Err(wrong_type()),
  };
  Ok(value)
}

fn output_label(name: &str, package: &PackageId) -> Result<Label, CoercionError> {
  let label = Label::parse_relative(name, package)?;
  if label.package() != package {
    return Err(CoercionError::ForeignOutput(name.to_string()));
  }
  Ok(label)
}
