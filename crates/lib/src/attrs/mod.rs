//! Rule attributes: types, `select()` values and attribute access.
//!
//! - [`types`] - declared attribute types and concrete values
//! - [`selector`] - `Selector` / `SelectorList` for configurable values
//! - [`mapper`] - raw and merged views over a rule's attributes

pub mod mapper;
pub mod selector;
pub mod types;

use thiserror::Error;

pub use mapper::AttributeMapper;
pub use selector::{ConditionResolver, Selector, SelectorList};
pub use types::{AttrKind, AttrType, AttributeValue, ListAttrKind, Value};

/// Contract violations raised while building or reading attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
  #[error("rule '{rule}' has no attribute '{attribute}'")]
  NoSuchAttribute { rule: String, attribute: String },

  #[error("attribute '{attribute}' of rule '{rule}' is not set")]
  NoValue { rule: String, attribute: String },

  /// Typed access to an attribute whose stored value has another shape, most
  /// notably a `select()` read through the raw (non-configurable) view.
  #[error("attribute '{attribute}' of rule '{rule}': expected {expected}, found {found}")]
  TypeMismatch {
    rule: String,
    attribute: String,
    expected: AttrType,
    found: String,
  },

  #[error("{context}: expected {expected}, found {found}")]
  SelectorTypeConflict {
    context: String,
    expected: AttrType,
    found: AttrType,
  },

  #[error("duplicate condition '{0}' in select()")]
  DuplicateCondition(String),

  #[error("select() requires at least one condition")]
  EmptySelector,

  #[error("values of type {0} cannot be concatenated")]
  NotConcatenable(AttrType),

  #[error("no condition of select() matched ({conditions}) and no default was set")]
  NoMatchingCondition { conditions: String },

  #[error("conditions '{first}' and '{second}' of select() both match")]
  AmbiguousCondition { first: String, second: String },
}
