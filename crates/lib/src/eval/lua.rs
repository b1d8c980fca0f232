//! Lua descriptor files.
//!
//! Each rule kind is a global function taking a table of attributes:
//!
//! ```lua
//! package { features = { "crosstool_default_false" } }
//!
//! sh_binary {
//!   name = "myrule",
//!   srcs = select {
//!     { "//conditions:a", { "a.sh" } },
//!     { "//conditions:default", { "default.sh" } },
//!   } + { "common.sh" },
//!   data = { ":data_a", ":data_b" },
//! }
//! ```
//!
//! `select` takes either a sequence of `{ condition, value }` pairs, which
//! keeps declaration order, or a table keyed by condition, whose branches are
//! taken in sorted key order. Called with anything but a table it behaves
//! like Lua's builtin `select`. `print` reports its arguments as an
//! informational event at the calling line.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::prelude::*;
use tracing::trace;

use super::{BuildFileEvaluator, BuildFileSource, EvalError, EvalOutput, RawSelector, RawValue, RuleCall};
use crate::events::{Event, Location};

/// Metatable marker of values returned by `select`.
const SELECT_TYPE: &str = "select";

const PRELUDE: &str = r##"
local rule_kinds, record_rule, record_package, record_print = ...
local builtin_select = select
local Select = { __type = "select" }

dofile, loadfile = nil, nil

local function arms(value)
  if getmetatable(value) == Select then
    return value.arms
  end
  return { { { "//conditions:default", value } } }
end

Select.__add = function(lhs, rhs)
  local joined = {}
  for _, arm in ipairs(arms(lhs)) do joined[#joined + 1] = arm end
  for _, arm in ipairs(arms(rhs)) do joined[#joined + 1] = arm end
  return setmetatable({ arms = joined }, Select)
end

-- error() prefixes its message with the position of the frame `level` up the
-- stack: error, pcall, caller_line, the rule function, then the caller.
local function caller_line()
  local _, where = pcall(error, "", 4)
  return tonumber(string.match(where, ":(%d+): $")) or 0
end

function select(conditions, ...)
  if type(conditions) ~= "table" then
    return builtin_select(conditions, ...)
  end
  local branches = {}
  if #conditions > 0 then
    for _, pair in ipairs(conditions) do
      branches[#branches + 1] = { pair[1], pair[2] }
    end
  else
    local keys = {}
    for key in pairs(conditions) do keys[#keys + 1] = key end
    table.sort(keys)
    for _, key in ipairs(keys) do
      branches[#branches + 1] = { key, conditions[key] }
    end
  end
  return setmetatable({ arms = { branches } }, Select)
end

for _, kind in ipairs(rule_kinds) do
  _G[kind] = function(args)
    record_rule(kind, caller_line(), args)
  end
end

function package(args)
  record_package(caller_line(), args)
end

function print(...)
  local parts = {}
  for i = 1, builtin_select("#", ...) do
    parts[i] = tostring((builtin_select(i, ...)))
  end
  record_print(caller_line(), table.concat(parts, "\t"))
end
"##;

/// Evaluates descriptor files as sandboxed Lua chunks. A fresh VM is created
/// per file, so no state leaks between packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct LuaEvaluator;

impl LuaEvaluator {
  pub fn new() -> Self {
    Self
  }
}

impl BuildFileEvaluator for LuaEvaluator {
  fn evaluate(&self, source: &BuildFileSource<'_>) -> Result<EvalOutput, EvalError> {
    let lua = Lua::new_with(
      LuaStdLib::TABLE | LuaStdLib::STRING | LuaStdLib::MATH | LuaStdLib::UTF8,
      mlua::LuaOptions::new(),
    )?;
    let output = Rc::new(RefCell::new(EvalOutput::default()));
    let path = source.path.to_path_buf();

    let record_rule = {
      let output = output.clone();
      let path = path.clone();
      lua.create_function(move |_, (kind, line, args): (String, u32, LuaValue)| {
        record_rule(&mut output.borrow_mut(), &path, kind, line, args);
        Ok(())
      })?
    };
    let record_package = {
      let output = output.clone();
      let path = path.clone();
      let called = RefCell::new(false);
      lua.create_function(move |_, (line, args): (u32, LuaValue)| {
        let first = !called.replace(true);
        record_package(&mut output.borrow_mut(), &path, line, args, first);
        Ok(())
      })?
    };

    let record_print = {
      let output = output.clone();
      let path = path.clone();
      lua.create_function(move |_, (line, message): (u32, String)| {
        let event = Event::info(message).with_location(Location::new(&path, line));
        output.borrow_mut().events.push(event);
        Ok(())
      })?
    };

    let kinds = lua.create_sequence_from(source.rule_kinds.iter().map(String::as_str))?;
    lua
      .load(PRELUDE)
      .set_name("=prelude")
      .call::<()>((kinds, record_rule, record_package, record_print))?;

    let chunk_name = chunk_name(source);
    trace!(chunk = %chunk_name, "evaluating descriptor file");
    if let Err(err) = lua.load(source.content).set_name(format!("={}", chunk_name)).exec() {
      let event = error_event(&err, &path);
      output.borrow_mut().events.push(event);
    }

    drop(lua);
    let output = Rc::try_unwrap(output)
      .map(RefCell::into_inner)
      .unwrap_or_else(|shared| shared.borrow().clone());
    Ok(output)
  }
}

/// Short, package-relative name used in Lua messages (`pkg/BUILD`).
fn chunk_name(source: &BuildFileSource<'_>) -> String {
  let file_name = source
    .path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  if source.package.is_root() {
    file_name
  } else {
    format!("{}/{}", source.package, file_name)
  }
}

fn record_rule(output: &mut EvalOutput, path: &Path, kind: String, line: u32, args: LuaValue) {
  let location = Location::new(path, line);
  let table = match args {
    LuaValue::Table(table) => table,
    other => {
      output.events.push(
        Event::error(format!(
          "{}() expects a table of attributes, got {}",
          kind,
          other.type_name()
        ))
        .with_location(location),
      );
      return;
    }
  };

  match table_to_args(&table) {
    Ok(args) => output.calls.push(RuleCall { kind, line, args }),
    Err(message) => output
      .events
      .push(Event::error(format!("{}(): {}", kind, message)).with_location(location)),
  }
}

fn record_package(output: &mut EvalOutput, path: &Path, line: u32, args: LuaValue, first: bool) {
  let location = Location::new(path, line);
  if !first {
    output
      .events
      .push(Event::error("package() may only be called once").with_location(location));
    return;
  }

  let args = match args {
    LuaValue::Table(table) => table_to_args(&table),
    LuaValue::Nil => Ok(Vec::new()),
    other => Err(format!("expects a table, got {}", other.type_name())),
  };
  let args = match args {
    Ok(args) => args,
    Err(message) => {
      output
        .events
        .push(Event::error(format!("package(): {}", message)).with_location(location));
      return;
    }
  };

  for (name, value) in args {
    match (name.as_str(), value) {
      ("features", RawValue::List(items)) => {
        for item in items {
          match item {
            RawValue::String(feature) => output.features.push(feature),
            other => output.events.push(
              Event::error(format!("package(): features must be strings, got {}", other.type_name()))
                .with_location(location.clone()),
            ),
          }
        }
      }
      (name, _) => output.events.push(
        Event::warning(format!("package(): ignoring unknown argument '{}'", name)).with_location(location.clone()),
      ),
    }
  }
}

/// Named arguments of a call, sorted by name.
fn table_to_args(table: &LuaTable) -> Result<Vec<(String, RawValue)>, String> {
  let mut args = Vec::new();
  for pair in table.pairs::<LuaValue, LuaValue>() {
    let (key, value) = pair.map_err(|e| e.to_string())?;
    let name = match key {
      LuaValue::String(s) => s.to_str().map_err(|e| e.to_string())?.to_string(),
      other => return Err(format!("attribute names must be strings, got {}", other.type_name())),
    };
    let value = lua_to_raw(value).map_err(|e| format!("attribute '{}': {}", name, e))?;
    args.push((name, value));
  }
  args.sort_by(|(a, _), (b, _)| a.cmp(b));
  Ok(args)
}

fn lua_to_raw(value: LuaValue) -> Result<RawValue, String> {
  match value {
    LuaValue::Boolean(b) => Ok(RawValue::Bool(b)),
    LuaValue::Integer(i) => Ok(RawValue::Int(i)),
    LuaValue::Number(n) if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 => Ok(RawValue::Int(n as i64)),
    LuaValue::Number(n) => Err(format!("non-integer number {}", n)),
    LuaValue::String(s) => Ok(RawValue::String(s.to_str().map_err(|e| e.to_string())?.to_string())),
    LuaValue::Table(table) => {
      if let Some(mt) = table.metatable()
        && let Ok(type_name) = mt.get::<String>("__type")
        && type_name == SELECT_TYPE
      {
        return select_to_raw(&table);
      }
      sequence_to_raw(&table).map(RawValue::List)
    }
    other => Err(format!("unsupported value of type {}", other.type_name())),
  }
}

fn sequence_to_raw(table: &LuaTable) -> Result<Vec<RawValue>, String> {
  let len = table.raw_len();
  let entries = table.pairs::<LuaValue, LuaValue>().count();
  if entries != len {
    return Err("tables must be sequences (dictionaries are not supported)".to_string());
  }

  let mut items = Vec::with_capacity(len);
  for i in 1..=len {
    let item: LuaValue = table.raw_get(i).map_err(|e| e.to_string())?;
    items.push(lua_to_raw(item)?);
  }
  Ok(items)
}

fn select_to_raw(table: &LuaTable) -> Result<RawValue, String> {
  let arms: LuaTable = table.get("arms").map_err(|e| e.to_string())?;
  let mut selectors = Vec::new();
  for arm in arms.sequence_values::<LuaTable>() {
    let arm = arm.map_err(|e| e.to_string())?;
    let mut branches = Vec::new();
    for branch in arm.sequence_values::<LuaTable>() {
      let branch = branch.map_err(|e| e.to_string())?;
      let condition: String = branch
        .raw_get(1)
        .map_err(|_| "select() conditions must be label strings".to_string())?;
      let value: LuaValue = branch.raw_get(2).map_err(|e| e.to_string())?;
      if value.is_nil() {
        return Err(format!("select() branch '{}' has no value", condition));
      }
      branches.push((condition, lua_to_raw(value)?));
    }
    selectors.push(RawSelector { branches });
  }
  Ok(RawValue::Select(selectors))
}

/// Turn a Lua error into an event, pulling the line out of the
/// `chunk:LINE: message` prefix Lua puts on syntax and runtime errors.
fn error_event(err: &LuaError, path: &Path) -> Event {
  let text = err.to_string();
  let first_line = text.lines().next().unwrap_or_default();
  match split_position(first_line) {
    Some((line, message)) => Event::error(message).with_location(Location::new(PathBuf::from(path), line)),
    None => Event::error(first_line),
  }
}

fn split_position(message: &str) -> Option<(u32, &str)> {
  for (idx, _) in message.match_indices(':') {
    let rest = &message[idx + 1..];
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && rest[digits..].starts_with(':') {
      let line = rest[..digits].parse().ok()?;
      return Some((line, rest[digits + 1..].trim_start()));
    }
  }
  None
}
