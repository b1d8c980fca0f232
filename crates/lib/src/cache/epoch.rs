use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

use super::stamp::{FileStamp, ModifiedFileSet};
use crate::error::PackageError;
use crate::label::PackageId;
use crate::locator::{PackageLocator, PackageLookup, PackageLookupValue};
use crate::package::Package;

/// Memoized outcome of loading one package, success or failure.
#[derive(Debug)]
pub(crate) struct CacheEntry {
  pub(crate) result: Result<Arc<Package>, PackageError>,
  /// Packages whose lookup the load depended on: its own, and every
  /// subpackage looked up by boundary checks.
  pub(crate) consulted: BTreeSet<PackageId>,
  /// Candidate descriptor paths of the consulted packages, stamped before
  /// they were looked up.
  pub(crate) deps: Vec<(PathBuf, FileStamp)>,
}

impl CacheEntry {
  pub(crate) fn implicated_by(&self, modified: &ModifiedFileSet) -> bool {
    self.deps.iter().any(|(path, _)| modified.touches(path))
  }

  /// Whether the load looked up any of `ids`.
  pub(crate) fn consulted_any(&self, ids: &BTreeSet<PackageId>) -> bool {
    !ids.is_empty() && self.consulted.iter().any(|id| ids.contains(id))
  }
}

/// A memoized lookup with the stamps of its candidate paths. Stamps are taken
/// before the filesystem is searched and the descriptor file is read.
#[derive(Debug, Clone)]
struct Lookup {
  value: PackageLookupValue,
  stamps: Vec<(PathBuf, FileStamp)>,
}

pub(crate) type EntryCell = Arc<OnceCell<CacheEntry>>;

/// Cache state between two syncs: one locator snapshot, the package entries
/// and memoized lookups made against it.
#[derive(Debug)]
pub(crate) struct Epoch {
  pub(crate) number: u64,
  pub(crate) locator: PackageLocator,
  entries: Mutex<HashMap<PackageId, EntryCell>>,
  lookups: Mutex<HashMap<PackageId, Lookup>>,
}

impl Epoch {
  pub(crate) fn new(number: u64, locator: PackageLocator, entries: HashMap<PackageId, EntryCell>) -> Self {
    Self {
      number,
      locator,
      entries: Mutex::new(entries),
      lookups: Mutex::new(HashMap::new()),
    }
  }

  /// The entry cell for `id`, created empty if absent. Concurrent callers get
  /// the same cell and so share a single load.
  pub(crate) fn cell(&self, id: &PackageId) -> EntryCell {
    lock(&self.entries).entry(id.clone()).or_default().clone()
  }

  /// Initialized entries only; loads still in flight are left out.
  pub(crate) fn settled(&self) -> Vec<(PackageId, EntryCell)> {
    lock(&self.entries)
      .iter()
      .filter(|(_, cell)| cell.initialized())
      .map(|(id, cell)| (id.clone(), cell.clone()))
      .collect()
  }

  pub(crate) fn len(&self) -> usize {
    lock(&self.entries).len()
  }

  /// Stamps recorded when `id` was first looked up in this epoch.
  pub(crate) fn stamps(&self, id: &PackageId) -> Vec<(PathBuf, FileStamp)> {
    self.resolve(id).stamps
  }

  fn resolve(&self, id: &PackageId) -> Lookup {
    if let Some(lookup) = lock(&self.lookups).get(id) {
      return lookup.clone();
    }
    let stamps = self
      .locator
      .candidates(id)
      .into_iter()
      .map(|path| {
        let stamp = FileStamp::of(&path);
        (path, stamp)
      })
      .collect();
    let lookup = Lookup {
      value: self.locator.locate(id),
      stamps,
    };
    // Concurrent first lookups race; the first one stored wins.
    lock(&self.lookups).entry(id.clone()).or_insert(lookup).clone()
  }
}

impl PackageLookup for Epoch {
  fn lookup(&self, id: &PackageId) -> PackageLookupValue {
    self.resolve(id).value
  }
}

/// Wraps a lookup and remembers which packages were asked about.
pub(crate) struct RecordingLookup<'a> {
  inner: &'a dyn PackageLookup,
  consulted: RefCell<BTreeSet<PackageId>>,
}

impl<'a> RecordingLookup<'a> {
  pub(crate) fn new(inner: &'a dyn PackageLookup) -> Self {
    Self {
      inner,
      consulted: RefCell::new(BTreeSet::new()),
    }
  }

  pub(crate) fn into_consulted(self) -> BTreeSet<PackageId> {
    self.consulted.into_inner()
  }
}

impl PackageLookup for RecordingLookup<'_> {
  fn lookup(&self, id: &PackageId) -> PackageLookupValue {
    self.consulted.borrow_mut().insert(id.clone());
    self.inner.lookup(id)
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
