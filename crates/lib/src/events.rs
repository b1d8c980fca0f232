//! Diagnostic events produced while loading packages.
//!
//! Events are plain data: a severity, a message and an optional source
//! location. The loader attaches them to the [`Package`](crate::package::Package)
//! it builds and the cache forwards them once to an [`EventHandler`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Error,
  Warning,
  Info,
}

/// Position inside a descriptor file. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
  pub path: PathBuf,
  pub line: u32,
  pub column: Option<u32>,
}

impl Location {
  pub fn new(path: impl Into<PathBuf>, line: u32) -> Self {
    Self {
      path: path.into(),
      line,
      column: None,
    }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.column {
      Some(column) => write!(f, "{}:{}:{}", self.path.display(), self.line, column),
      None => write!(f, "{}:{}", self.path.display(), self.line),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
  pub severity: Severity,
  pub message: String,
  pub location: Option<Location>,
}

impl Event {
  pub fn error(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Error,
      message: message.into(),
      location: None,
    }
  }

  pub fn warning(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Warning,
      message: message.into(),
      location: None,
    }
  }

  pub fn info(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Info,
      message: message.into(),
      location: None,
    }
  }

  pub fn with_location(mut self, location: Location) -> Self {
    self.location = Some(location);
    self
  }

  pub fn is_error(&self) -> bool {
    self.severity == Severity::Error
  }
}

impl fmt::Display for Event {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.location {
      Some(location) => write!(f, "{}: {}", location, self.message),
      None => f.write_str(&self.message),
    }
  }
}

/// Receives every event emitted while loading. Formatting and display are
/// up to the implementation.
pub trait EventHandler: Send + Sync {
  fn handle(&self, event: &Event);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventHandler;

impl EventHandler for TracingEventHandler {
  fn handle(&self, event: &Event) {
    let location = event.location.as_ref().map(ToString::to_string).unwrap_or_default();
    match event.severity {
      Severity::Error => error!(%location, "{}", event.message),
      Severity::Warning => warn!(%location, "{}", event.message),
      Severity::Info => info!(%location, "{}", event.message),
    }
  }
}

/// Stores events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct EventCollector {
  events: Mutex<Vec<Event>>,
}

impl EventCollector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn events(&self) -> Vec<Event> {
    self.lock().clone()
  }

  pub fn clear(&self) {
    self.lock().clear();
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  /// Whether any collected event message contains `needle`.
  pub fn contains(&self, needle: &str) -> bool {
    self.lock().iter().any(|e| e.message.contains(needle))
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
    // A panicking handler cannot leave the vector half-written.
    self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl EventHandler for EventCollector {
  fn handle(&self, event: &Event) {
    self.lock().push(event.clone());
  }
}
