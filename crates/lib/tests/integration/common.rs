//! Shared test helpers for package loading integration tests.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, SystemTime};

use pkgload_lib::eval::{BuildFileEvaluator, BuildFileSource, EvalError, EvalOutput, LuaEvaluator};
use pkgload_lib::loader::PackageLoader;
use pkgload_lib::schema::RuleClassRegistry;
use pkgload_lib::{EventCollector, Label, PackageCache, PackageId, PackageLocator};
use tempfile::TempDir;

/// Isolated scratch workspace.
///
/// Each test gets its own temporary directory; `root()` is the default
/// package-path entry and other roots can be created next to it.
pub struct Workspace {
  pub temp: TempDir,
  pub events: Arc<EventCollector>,
  touches: Cell<u64>,
}

impl Workspace {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("workspace")).unwrap();
    Self {
      temp,
      events: Arc::new(EventCollector::new()),
      touches: Cell::new(0),
    }
  }

  /// The main package-path root.
  pub fn root(&self) -> PathBuf {
    self.temp.path().join("workspace")
  }

  /// An additional package-path root, created on first use.
  pub fn other_root(&self, name: &str) -> PathBuf {
    let p = self.temp.path().join(name);
    std::fs::create_dir_all(&p).unwrap();
    p
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.root().join(relative_path)
  }

  /// Write a file relative to the main root.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    write_under(&self.root(), relative_path, content)
  }

  pub fn delete_file(&self, relative_path: &str) {
    std::fs::remove_file(self.path(relative_path)).unwrap();
  }

  /// Bump the modification time without changing content. Every call moves
  /// the time further, so consecutive touches are always distinguishable.
  pub fn touch(&self, relative_path: &str) {
    let n = self.touches.get() + 1;
    self.touches.set(n);
    let file = std::fs::File::options()
      .write(true)
      .open(self.path(relative_path))
      .unwrap();
    file
      .set_modified(SystemTime::now() + Duration::from_secs(60 * n))
      .unwrap();
  }

  /// A cache over the main root only.
  pub fn cache(&self) -> PackageCache {
    self.cache_with_roots(vec![self.root()])
  }

  pub fn cache_with_roots(&self, roots: Vec<PathBuf>) -> PackageCache {
    PackageCache::new(
      PackageLocator::new(roots, "BUILD"),
      Arc::new(PackageLoader::with_defaults()),
      self.events.clone(),
    )
  }

  /// A cache over the main root whose evaluations block on `gate`.
  pub fn gated_cache(&self, gate: &Arc<GatedEvaluator>) -> PackageCache {
    let loader = PackageLoader::new(gate.clone(), Arc::new(RuleClassRegistry::builtin()));
    PackageCache::new(
      PackageLocator::new(vec![self.root()], "BUILD"),
      Arc::new(loader),
      self.events.clone(),
    )
  }
}

/// Lua evaluation that holds every call until the gate is opened.
///
/// The descriptor file has already been read when `evaluate` runs, so edits
/// made while a call is held are not seen by that call.
#[derive(Default)]
pub struct GatedEvaluator {
  entered: AtomicUsize,
  open: Mutex<bool>,
  opened: Condvar,
}

impl GatedEvaluator {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Number of evaluations started so far.
  pub fn calls(&self) -> usize {
    self.entered.load(Ordering::SeqCst)
  }

  /// Wait until `n` evaluations have started.
  pub async fn wait_for_calls(&self, n: usize) {
    tokio::time::timeout(Duration::from_secs(10), async {
      while self.calls() < n {
        tokio::time::sleep(Duration::from_millis(5)).await;
      }
    })
    .await
    .expect("evaluations did not start");
  }

  /// Release held and future evaluations.
  pub fn open(&self) {
    *self.open.lock().unwrap() = true;
    self.opened.notify_all();
  }
}

impl BuildFileEvaluator for GatedEvaluator {
  fn evaluate(&self, source: &BuildFileSource<'_>) -> Result<EvalOutput, EvalError> {
    self.entered.fetch_add(1, Ordering::SeqCst);
    let mut open = self.open.lock().unwrap();
    while !*open {
      open = self.opened.wait(open).unwrap();
    }
    drop(open);
    LuaEvaluator::new().evaluate(source)
  }
}

pub fn write_under(root: &Path, relative_path: &str, content: &str) -> PathBuf {
  let path = root.join(relative_path);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(&path, content).unwrap();
  path
}

pub fn id(name: &str) -> PackageId {
  PackageId::new(name).unwrap()
}

pub fn label(s: &str) -> Label {
  Label::parse(s).unwrap()
}
