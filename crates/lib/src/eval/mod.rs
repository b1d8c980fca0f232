//! The descriptor-file evaluator seam.
//!
//! Parsing and evaluating a descriptor file is delegated to a
//! [`BuildFileEvaluator`]. It receives the raw bytes of the file and returns
//! the rule invocations it made, in call order, plus any diagnostics. Values
//! are untyped ([`RawValue`]); the loader coerces them with the rule schema.
//!
//! - [`lua`] - evaluator for Lua descriptor files

pub mod lua;

use std::path::Path;

use thiserror::Error;

use crate::events::Event;
use crate::label::PackageId;

pub use lua::LuaEvaluator;

/// Untyped value produced by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
  Bool(bool),
  Int(i64),
  String(String),
  List(Vec<RawValue>),
  /// `select(..) + select(..) + ...`; plain operands appear as a selector
  /// with a single default branch.
  Select(Vec<RawSelector>),
}

impl RawValue {
  pub fn type_name(&self) -> &'static str {
    match self {
      RawValue::Bool(_) => "bool",
      RawValue::Int(_) => "int",
      RawValue::String(_) => "string",
      RawValue::List(_) => "list",
      RawValue::Select(_) => "select",
    }
  }
}

/// Branches of one `select()` in declaration order, keyed by the condition
/// label exactly as written.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSelector {
  pub branches: Vec<(String, RawValue)>,
}

/// One top-level rule invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCall {
  pub kind: String,
  /// 1-based line of the call; 0 if unknown.
  pub line: u32,
  pub args: Vec<(String, RawValue)>,
}

impl RuleCall {
  pub fn arg(&self, name: &str) -> Option<&RawValue> {
    self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
  }
}

/// Everything the evaluator extracted from one descriptor file.
#[derive(Debug, Default, Clone)]
pub struct EvalOutput {
  pub calls: Vec<RuleCall>,
  /// Set by the package-level declaration, if any.
  pub features: Vec<String>,
  /// Syntax and evaluation diagnostics. Any error event marks the package as
  /// containing errors; calls made before the failure are still returned.
  pub events: Vec<Event>,
}

/// Input handed to the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct BuildFileSource<'a> {
  pub package: &'a PackageId,
  pub path: &'a Path,
  pub content: &'a [u8],
  /// Rule kinds known to the schema; each is callable from the file.
  pub rule_kinds: &'a [String],
}

/// The evaluator could not run at all (as opposed to the file being wrong).
#[derive(Debug, Error)]
pub enum EvalError {
  #[error("lua error: {0}")]
  Lua(#[from] mlua::Error),
}

pub trait BuildFileEvaluator: Send + Sync {
  fn evaluate(&self, source: &BuildFileSource<'_>) -> Result<EvalOutput, EvalError>;
}
