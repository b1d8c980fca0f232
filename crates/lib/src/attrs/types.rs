//! Attribute types and values.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AttributeError;
use super::selector::SelectorList;
use crate::label::Label;

/// Declared type of a rule attribute. This is a schema property: it does not
/// change when a value is made configurable with `select()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
  Bool,
  Int,
  String,
  StringList,
  Label,
  LabelList,
  Output,
  OutputList,
}

impl AttrType {
  pub fn name(self) -> &'static str {
    match self {
      AttrType::Bool => "boolean",
      AttrType::Int => "integer",
      AttrType::String => "string",
      AttrType::StringList => "list(string)",
      AttrType::Label => "label",
      AttrType::LabelList => "list(label)",
      AttrType::Output => "output",
      AttrType::OutputList => "list(output)",
    }
  }

  pub fn is_list(self) -> bool {
    matches!(self, AttrType::StringList | AttrType::LabelList | AttrType::OutputList)
  }

  /// Label-valued types that name other targets (dependencies).
  pub fn is_label(self) -> bool {
    matches!(self, AttrType::Label | AttrType::LabelList)
  }

  /// Label-valued types that declare files produced by the rule.
  pub fn is_output(self) -> bool {
    matches!(self, AttrType::Output | AttrType::OutputList)
  }

  /// Whether two values of this type can be joined with `+`.
  pub fn is_concatenable(self) -> bool {
    self.is_list() || self == AttrType::String
  }
}

impl fmt::Display for AttrType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// A concrete attribute value of one of the [`AttrType`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Bool(bool),
  Int(i64),
  String(String),
  StringList(Vec<String>),
  Label(Label),
  LabelList(Vec<Label>),
  Output(Label),
  OutputList(Vec<Label>),
}

impl Value {
  pub fn attr_type(&self) -> AttrType {
    match self {
      Value::Bool(_) => AttrType::Bool,
      Value::Int(_) => AttrType::Int,
      Value::String(_) => AttrType::String,
      Value::StringList(_) => AttrType::StringList,
      Value::Label(_) => AttrType::Label,
      Value::LabelList(_) => AttrType::LabelList,
      Value::Output(_) => AttrType::Output,
      Value::OutputList(_) => AttrType::OutputList,
    }
  }

  /// Value used when a rule does not set an optional attribute that has no
  /// explicit default. Single labels have none.
  pub fn implicit_default(ty: AttrType) -> Option<Value> {
    match ty {
      AttrType::Bool => Some(Value::Bool(false)),
      AttrType::Int => Some(Value::Int(0)),
      AttrType::String => Some(Value::String(String::new())),
      AttrType::StringList => Some(Value::StringList(Vec::new())),
      AttrType::LabelList => Some(Value::LabelList(Vec::new())),
      AttrType::OutputList => Some(Value::OutputList(Vec::new())),
      AttrType::Label | AttrType::Output => None,
    }
  }

  /// Labels held by a label- or output-typed value.
  pub fn labels(&self) -> &[Label] {
    match self {
      Value::Label(label) | Value::Output(label) => std::slice::from_ref(label),
      Value::LabelList(labels) | Value::OutputList(labels) => labels,
      _ => &[],
    }
  }

  /// `self + other` for concatenable types of the same type.
  pub fn concat(mut self, other: &Value) -> Result<Value, AttributeError> {
    match (&mut self, other) {
      (Value::String(a), Value::String(b)) => a.push_str(b),
      (Value::StringList(a), Value::StringList(b)) => a.extend(b.iter().cloned()),
      (Value::LabelList(a), Value::LabelList(b)) | (Value::OutputList(a), Value::OutputList(b)) => {
        a.extend(b.iter().cloned())
      }
      (this, other) if this.attr_type() != other.attr_type() => {
        return Err(AttributeError::SelectorTypeConflict {
          context: "concatenation".to_string(),
          expected: this.attr_type(),
          found: other.attr_type(),
        });
      }
      (this, _) => return Err(AttributeError::NotConcatenable(this.attr_type())),
    }
    Ok(self)
  }
}

/// The stored shape of a rule attribute: a plain value or a `select()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
  Plain(Value),
  Configurable(SelectorList),
}

impl AttributeValue {
  pub fn attr_type(&self) -> AttrType {
    match self {
      AttributeValue::Plain(value) => value.attr_type(),
      AttributeValue::Configurable(list) => list.ty(),
    }
  }

  pub fn is_configurable(&self) -> bool {
    matches!(self, AttributeValue::Configurable(_))
  }

  pub fn as_plain(&self) -> Option<&Value> {
    match self {
      AttributeValue::Plain(value) => Some(value),
      AttributeValue::Configurable(_) => None,
    }
  }
}

/// Static counterpart of an [`AttrType`], used for typed attribute access.
pub trait AttrKind {
  type Value;
  const TYPE: AttrType;

  fn cast(value: &Value) -> Option<&Self::Value>;
}

/// An [`AttrKind`] whose values are lists and can therefore be merged.
pub trait ListAttrKind: AttrKind<Value = Vec<Self::Element>> {
  type Element: Clone;
}

macro_rules! attr_kind {
  ($(#[$doc:meta])* $kind:ident => $variant:ident($value:ty)) => {
    $(#[$doc])*
    #[derive(Debug, Clone, Copy)]
    pub struct $kind;

    impl AttrKind for $kind {
      type Value = $value;
      const TYPE: AttrType = AttrType::$variant;

      fn cast(value: &Value) -> Option<&$value> {
        match value {
          Value::$variant(v) => Some(v),
          _ => None,
        }
      }
    }
  };
}

attr_kind!(BoolType => Bool(bool));
attr_kind!(IntType => Int(i64));
attr_kind!(StringType => String(String));
attr_kind!(StringListType => StringList(Vec<String>));
attr_kind!(LabelType => Label(Label));
attr_kind!(LabelListType => LabelList(Vec<Label>));
attr_kind!(OutputType => Output(Label));
attr_kind!(OutputListType => OutputList(Vec<Label>));

impl ListAttrKind for StringListType {
  type Element = String;
}

impl ListAttrKind for LabelListType {
  type Element = Label;
}

impl ListAttrKind for OutputListType {
  type Element = Label;
}
