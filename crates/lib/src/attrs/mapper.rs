//! Raw access to a rule's attributes.
//!
//! The mapper offers two views that never blend:
//!
//! - **Raw**: typed reads and label visitation of plain values. Reading a
//!   configurable (`select()`) attribute through this view is a
//!   [`AttributeError::TypeMismatch`]; callers that cannot handle
//!   configurability never receive a placeholder.
//! - **Merged**: every branch of every `select()` flattened in declaration
//!   order, ignoring configuration ([`AttributeMapper::merged_values`],
//!   [`AttributeMapper::visit_all_labels`]).

use std::collections::BTreeSet;

use super::AttributeError;
use super::types::{AttrKind, AttrType, AttributeValue, ListAttrKind};
use crate::label::Label;
use crate::package::{Rule, RuleAttribute};

#[derive(Debug, Clone, Copy)]
pub struct AttributeMapper<'a> {
  rule: &'a Rule,
}

impl<'a> AttributeMapper<'a> {
  pub fn of(rule: &'a Rule) -> Self {
    Self { rule }
  }

  fn attribute(&self, name: &str) -> Result<&'a RuleAttribute, AttributeError> {
    self.rule.attribute(name).ok_or_else(|| AttributeError::NoSuchAttribute {
      rule: self.rule.label().to_string(),
      attribute: name.to_string(),
    })
  }

  fn mismatch(&self, attribute: &RuleAttribute, expected: AttrType, found: String) -> AttributeError {
    AttributeError::TypeMismatch {
      rule: self.rule.label().to_string(),
      attribute: attribute.name().to_string(),
      expected,
      found,
    }
  }

  /// The plain value of `name` as `K`, or `None` if the attribute is unset.
  pub fn try_get<K: AttrKind>(&self, name: &str) -> Result<Option<&'a K::Value>, AttributeError> {
    let attribute = self.attribute(name)?;
    if attribute.ty() != K::TYPE {
      return Err(self.mismatch(attribute, K::TYPE, attribute.ty().to_string()));
    }
    match attribute.value() {
      None => Ok(None),
      Some(AttributeValue::Configurable(list)) => Err(self.mismatch(attribute, K::TYPE, format!("select() of {}", list.ty()))),
      Some(AttributeValue::Plain(value)) => K::cast(value)
        .map(Some)
        .ok_or_else(|| self.mismatch(attribute, K::TYPE, value.attr_type().to_string())),
    }
  }

  /// The plain value of `name` as `K`.
  pub fn get<K: AttrKind>(&self, name: &str) -> Result<&'a K::Value, AttributeError> {
    self.try_get::<K>(name)?.ok_or_else(|| AttributeError::NoValue {
      rule: self.rule.label().to_string(),
      attribute: name.to_string(),
    })
  }

  /// Declared type of `name`, configurable or not.
  pub fn attribute_type(&self, name: &str) -> Option<AttrType> {
    self.rule.attribute(name).map(RuleAttribute::ty)
  }

  pub fn is_configurable(&self, name: &str) -> bool {
    self
      .rule
      .attribute(name)
      .and_then(RuleAttribute::value)
      .is_some_and(AttributeValue::is_configurable)
  }

  /// Every condition label used by `name`'s `select()`s, the default condition
  /// included. Empty for plain attributes.
  pub fn configurability_keys(&self, name: &str) -> BTreeSet<Label> {
    match self.rule.attribute(name).and_then(RuleAttribute::value) {
      Some(AttributeValue::Configurable(list)) => list.condition_keys(),
      _ => BTreeSet::new(),
    }
  }

  /// All values `name` could take, concatenated across every branch of every
  /// `select()` (duplicates kept). Plain attributes are returned as-is.
  pub fn merged_values<K: ListAttrKind>(&self, name: &str) -> Result<Vec<K::Element>, AttributeError> {
    let attribute = self.attribute(name)?;
    if attribute.ty() != K::TYPE {
      return Err(self.mismatch(attribute, K::TYPE, attribute.ty().to_string()));
    }
    let merged = match attribute.value() {
      None => return Ok(Vec::new()),
      Some(AttributeValue::Plain(value)) => value.clone(),
      Some(AttributeValue::Configurable(list)) => list.merge_all_branches()?,
    };
    K::cast(&merged)
      .cloned()
      .ok_or_else(|| self.mismatch(attribute, K::TYPE, merged.attr_type().to_string()))
  }

  /// Call `visitor` for every label held by a label- or output-typed
  /// attribute. Fails on the first configurable label attribute; visiting
  /// those needs a configuration.
  pub fn visit_labels<F>(&self, mut visitor: F) -> Result<(), AttributeError>
  where
    F: FnMut(&'a Label, &'a RuleAttribute),
  {
    for attribute in label_attributes(self.rule) {
      match attribute.value() {
        None => {}
        Some(AttributeValue::Plain(value)) => value.labels().iter().for_each(|l| visitor(l, attribute)),
        Some(AttributeValue::Configurable(list)) => {
          return Err(self.mismatch(attribute, attribute.ty(), format!("select() of {}", list.ty())));
        }
      }
    }
    Ok(())
  }

  /// Like [`visit_labels`](Self::visit_labels), but visits every branch of
  /// configurable attributes instead of failing.
  pub fn visit_all_labels<F>(&self, mut visitor: F)
  where
    F: FnMut(&'a Label, &'a RuleAttribute),
  {
    for attribute in label_attributes(self.rule) {
      match attribute.value() {
        None => {}
        Some(AttributeValue::Plain(value)) => value.labels().iter().for_each(|l| visitor(l, attribute)),
        Some(AttributeValue::Configurable(list)) => {
          for selector in list.selectors() {
            for (_, value) in selector.entries() {
              value.labels().iter().for_each(|l| visitor(l, attribute));
            }
          }
        }
      }
    }
  }
}

fn label_attributes(rule: &Rule) -> impl Iterator<Item = &RuleAttribute> {
  rule
    .attributes()
    .iter()
    .filter(|a| a.ty().is_label() || a.ty().is_output())
}
