//! `select()` values.
//!
//! A [`Selector`] maps condition labels to values of one declared type; a
//! [`SelectorList`] is the concatenation `select(..) + select(..) + ...`.
//! A plain value that takes part in a concatenation is stored as a selector
//! whose only branch is the default condition.

use std::collections::{BTreeSet, HashSet};

use super::AttributeError;
use super::types::{AttrType, Value};
use crate::label::Label;

/// Decides which conditions hold for the configuration being resolved.
pub trait ConditionResolver {
  fn is_active(&self, condition: &Label) -> bool;
}

impl ConditionResolver for HashSet<Label> {
  fn is_active(&self, condition: &Label) -> bool {
    self.contains(condition)
  }
}

impl ConditionResolver for BTreeSet<Label> {
  fn is_active(&self, condition: &Label) -> bool {
    self.contains(condition)
  }
}

impl<R: ConditionResolver + ?Sized> ConditionResolver for &R {
  fn is_active(&self, condition: &Label) -> bool {
    (**self).is_active(condition)
  }
}

/// One `select({...})`: branches in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
  ty: AttrType,
  entries: Vec<(Label, Value)>,
}

impl Selector {
  pub fn new(ty: AttrType, entries: Vec<(Label, Value)>) -> Result<Self, AttributeError> {
    if entries.is_empty() {
      return Err(AttributeError::EmptySelector);
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for (condition, value) in &entries {
      if value.attr_type() != ty {
        return Err(AttributeError::SelectorTypeConflict {
          context: format!("select() branch '{}'", condition),
          expected: ty,
          found: value.attr_type(),
        });
      }
      if !seen.insert(condition) {
        return Err(AttributeError::DuplicateCondition(condition.to_string()));
      }
    }

    Ok(Self { ty, entries })
  }

  /// A selector that always yields `value`.
  pub fn plain(value: Value) -> Self {
    Self {
      ty: value.attr_type(),
      entries: vec![(Label::default_condition(), value)],
    }
  }

  pub fn ty(&self) -> AttrType {
    self.ty
  }

  /// Every branch, default included, in declaration order.
  pub fn entries(&self) -> &[(Label, Value)] {
    &self.entries
  }

  /// Explicit condition keys in declaration order (the default key excluded).
  pub fn conditions(&self) -> impl Iterator<Item = &Label> {
    self
      .entries
      .iter()
      .map(|(condition, _)| condition)
      .filter(|condition| !condition.is_default_condition())
  }

  pub fn default_value(&self) -> Option<&Value> {
    self
      .entries
      .iter()
      .find(|(condition, _)| condition.is_default_condition())
      .map(|(_, value)| value)
  }

  pub fn has_default(&self) -> bool {
    self.default_value().is_some()
  }

  /// Explicit conditions that `resolver` reports as active.
  pub fn active_conditions<R: ConditionResolver>(&self, resolver: &R) -> Vec<&Label> {
    self.conditions().filter(|c| resolver.is_active(c)).collect()
  }

  /// The branch chosen under `resolver`: the single active explicit condition,
  /// or the default when none is active.
  pub fn select<R: ConditionResolver>(&self, resolver: &R) -> Result<&Value, AttributeError> {
    let active = self.active_conditions(resolver);
    match active.as_slice() {
      [] => self.default_value().ok_or_else(|| AttributeError::NoMatchingCondition {
        conditions: self.conditions().map(ToString::to_string).collect::<Vec<_>>().join(", "),
      }),
      [condition] => Ok(self
        .entries
        .iter()
        .find(|(c, _)| c == *condition)
        .map(|(_, value)| value)
        .ok_or(AttributeError::EmptySelector)?),
      [first, second, ..] => Err(AttributeError::AmbiguousCondition {
        first: first.to_string(),
        second: second.to_string(),
      }),
    }
  }
}

/// `selector1 + selector2 + ...`, all of one declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
  ty: AttrType,
  selectors: Vec<Selector>,
}

impl SelectorList {
  pub fn new(selectors: Vec<Selector>) -> Result<Self, AttributeError> {
    let ty = selectors.first().ok_or(AttributeError::EmptySelector)?.ty();

    for (idx, selector) in selectors.iter().enumerate().skip(1) {
      if selector.ty() != ty {
        return Err(AttributeError::SelectorTypeConflict {
          context: format!("select() #{} of a concatenation", idx + 1),
          expected: ty,
          found: selector.ty(),
        });
      }
    }
    if selectors.len() > 1 && !ty.is_concatenable() {
      return Err(AttributeError::NotConcatenable(ty));
    }

    Ok(Self { ty, selectors })
  }

  pub fn of(selector: Selector) -> Self {
    Self {
      ty: selector.ty(),
      selectors: vec![selector],
    }
  }

  pub fn ty(&self) -> AttrType {
    self.ty
  }

  pub fn selectors(&self) -> &[Selector] {
    &self.selectors
  }

  /// `self + other`.
  pub fn concat(self, other: SelectorList) -> Result<Self, AttributeError> {
    let mut selectors = self.selectors;
    selectors.extend(other.selectors);
    Self::new(selectors)
  }

  /// Every condition key of every selector, the default key included.
  pub fn condition_keys(&self) -> BTreeSet<Label> {
    self
      .selectors
      .iter()
      .flat_map(|s| s.entries().iter().map(|(condition, _)| condition.clone()))
      .collect()
  }

  /// Concatenate the branch each selector chooses under `resolver`, in
  /// concatenation order.
  pub fn resolve<R: ConditionResolver>(&self, resolver: &R) -> Result<Value, AttributeError> {
    let mut chosen = self.selectors.iter().map(|s| s.select(resolver));
    let first = chosen.next().ok_or(AttributeError::EmptySelector)??.clone();
    chosen.try_fold(first, |acc, next| acc.concat(next?))
  }

  /// Concatenate every branch of every selector regardless of configuration:
  /// branches of one selector in declaration order, selectors in
  /// concatenation order, duplicates kept. Only list types can be merged.
  pub fn merge_all_branches(&self) -> Result<Value, AttributeError> {
    if !self.ty.is_list() {
      return Err(AttributeError::NotConcatenable(self.ty));
    }
    let mut branches = self.selectors.iter().flat_map(|s| s.entries().iter().map(|(_, v)| v));
    let first = branches.next().ok_or(AttributeError::EmptySelector)?.clone();
    branches.try_fold(first, |acc, next| acc.concat(next))
  }
}
