//! CLI output formatting utilities.
//!
//! Colored status lines, attribute value rendering and a terminal
//! [`EventHandler`] for package diagnostics.

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};
use pkgload_lib::attrs::{AttributeValue, Value};
use pkgload_lib::events::Severity;
use pkgload_lib::{Event, EventHandler};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Render a value the way it would be written in a descriptor file.
pub fn format_value(value: &Value) -> String {
  fn list<T: ToString>(items: &[T]) -> String {
    let quoted: Vec<_> = items.iter().map(|i| format!("\"{}\"", i.to_string())).collect();
    format!("{{ {} }}", quoted.join(", "))
  }

  match value {
    Value::Bool(b) => b.to_string(),
    Value::Int(i) => i.to_string(),
    Value::String(s) => format!("\"{}\"", s),
    Value::Label(l) | Value::Output(l) => format!("\"{}\"", l),
    Value::StringList(items) => list(items),
    Value::LabelList(items) | Value::OutputList(items) => list(items),
  }
}

pub fn format_attribute_value(value: &AttributeValue) -> String {
  match value {
    AttributeValue::Plain(value) => format_value(value),
    AttributeValue::Configurable(list) => list
      .selectors()
      .iter()
      .map(|selector| {
        let branches: Vec<_> = selector
          .entries()
          .iter()
          .map(|(condition, value)| format!("[\"{}\"] = {}", condition, format_value(value)))
          .collect();
        format!("select {{ {} }}", branches.join(", "))
      })
      .collect::<Vec<_>>()
      .join(" + "),
  }
}

/// Prints package diagnostics to stderr as they are reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleEventHandler;

impl EventHandler for ConsoleEventHandler {
  fn handle(&self, event: &Event) {
    match event.severity {
      Severity::Error => print_error(&event.to_string()),
      Severity::Warning => print_warning(&event.to_string()),
      Severity::Info => eprintln!("{} {}", symbols::INFO, event),
    }
  }
}
