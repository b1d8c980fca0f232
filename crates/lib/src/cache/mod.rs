//! Epoch-scoped package cache.
//!
//! Every package key is in one of three states: unknown, cached success or
//! cached failure. Both cached states are returned as-is until the next
//! [`PackageCache::sync`], including "not found": a missing package stays
//! missing within an epoch even if its descriptor file appears meanwhile.
//!
//! Concurrent lookups of the same key share one load. Loads run on the
//! blocking pool against the epoch current when they started; a sync never
//! lets a load observe a mix of two epochs.
//!
//! The package path and deleted-packages set are configured for the *next*
//! epoch and take effect at `sync()`.

mod epoch;
mod stamp;

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, error, info, trace};

use self::epoch::{CacheEntry, Epoch, RecordingLookup};
use self::stamp::FileStamp;
use crate::boundary::PackageBoundaryValidator;
use crate::error::{NotFoundReason, PackageError};
use crate::events::EventHandler;
use crate::label::{Label, LabelError, PackageId};
use crate::loader::PackageLoader;
use crate::locator::{PackageLocator, PackageLookup};
use crate::options::PackageCacheOptions;
use crate::package::{Package, Target};

pub use self::stamp::ModifiedFileSet;

pub struct PackageCache {
  loader: Arc<PackageLoader>,
  handler: Arc<dyn EventHandler>,
  current: RwLock<Arc<Epoch>>,
  next_locator: Mutex<PackageLocator>,
}

impl PackageCache {
  pub fn new(locator: PackageLocator, loader: Arc<PackageLoader>, handler: Arc<dyn EventHandler>) -> Self {
    Self {
      loader,
      handler,
      current: RwLock::new(Arc::new(Epoch::new(0, locator.clone(), HashMap::new()))),
      next_locator: Mutex::new(locator),
    }
  }

  /// A cache over Lua descriptor files and the builtin rule classes.
  pub fn from_options(options: &PackageCacheOptions, handler: Arc<dyn EventHandler>) -> Result<Self, LabelError> {
    let locator = PackageLocator::from_options(options)?;
    Ok(Self::new(locator, Arc::new(PackageLoader::with_defaults()), handler))
  }

  pub fn loader(&self) -> &Arc<PackageLoader> {
    &self.loader
  }

  /// Number of the current epoch; starts at 0 and grows by one per sync.
  pub fn epoch(&self) -> u64 {
    self.current().number
  }

  /// The locator snapshot lookups currently use.
  pub fn locator(&self) -> PackageLocator {
    self.current().locator.clone()
  }

  fn current(&self) -> Arc<Epoch> {
    self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Get package `id`, loading it on first use in the current epoch.
  ///
  /// Successes and failures are both memoized until the next sync.
  /// Concurrent callers for the same package share one load, and a caller
  /// always sees the epoch that was current when it called, even if a sync
  /// happens while the load runs.
  ///
  /// # Arguments
  ///
  /// * `id` - Package to load
  ///
  /// # Returns
  ///
  /// The package, possibly with `contains_errors` set, or the cached
  /// [`PackageError`] for a missing, deleted or unreadable package.
  pub async fn get_package(&self, id: &PackageId) -> Result<Arc<Package>, PackageError> {
    let epoch = self.current();
    self.get_in(&epoch, id).await
  }

  /// Like [`get_package`](Self::get_package) for an unparsed name. An invalid
  /// name fails with `NotFound` and is not memoized.
  pub async fn get_package_by_name(&self, name: &str) -> Result<Arc<Package>, PackageError> {
    let id = PackageId::new(name).map_err(|e| PackageError::NotFound {
      package: name.to_string(),
      reason: NotFoundReason::InvalidName(e.to_string()),
    })?;
    self.get_package(&id).await
  }

  /// Resolve `label` to a target of its (loaded) package. Boundary crossings
  /// and missing targets are per-lookup errors; the package entry stays a
  /// success.
  ///
  /// # Arguments
  ///
  /// * `label` - Target to resolve
  ///
  /// # Returns
  ///
  /// The target, or the package error, a boundary crossing, or `NoSuchTarget`.
  pub async fn get_target(&self, label: &Label) -> Result<Arc<Target>, PackageError> {
    let epoch = self.current();
    let package = self.get_in(&epoch, label.package()).await?;
    PackageBoundaryValidator::new(epoch.as_ref()).check(label)?;
    package.target(label.name()).cloned()
  }

  /// Whether `id` has a live descriptor file in the current epoch. Does not
  /// load the package.
  pub fn is_package(&self, id: &PackageId) -> bool {
    self.current().lookup(id).is_package()
  }

  /// [`is_package`](Self::is_package) for an unparsed name; invalid names
  /// are simply not packages.
  pub fn is_package_name(&self, name: &str) -> bool {
    PackageId::new(name).is_ok_and(|id| self.is_package(&id))
  }

  /// Replace the deleted-packages set, effective at the next sync.
  pub fn set_deleted_packages(&self, deleted: impl IntoIterator<Item = PackageId>) {
    let mut next = lock(&self.next_locator);
    *next = next.clone().with_deleted(deleted);
  }

  /// Replace the package path, effective at the next sync.
  pub fn set_package_path(&self, roots: Vec<PathBuf>) {
    let mut next = lock(&self.next_locator);
    *next = next.clone().with_roots(roots);
  }

  /// Start a new epoch.
  ///
  /// Entries not implicated by the change carry over unchanged (same
  /// `Arc<Package>`). An entry is implicated when
  /// - one of its dependency paths is in `modified` or below one of them, or
  /// - it looked up a package whose deleted status differs between the
  ///   current and the staged deleted-packages set.
  ///
  /// A changed package path or descriptor file name, or
  /// [`ModifiedFileSet::Everything`], drops every entry. Loads still in
  /// flight finish against the old epoch and are not carried over.
  ///
  /// # Arguments
  ///
  /// * `modified` - Files changed since the previous sync
  pub fn sync(&self, modified: &ModifiedFileSet) {
    let next_locator = lock(&self.next_locator).clone();
    let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
    let previous = current.clone();

    let reset = matches!(modified, ModifiedFileSet::Everything) || !next_locator.same_search_path(&previous.locator);
    let flipped = previous.locator.deletion_changes(&next_locator);
    let mut entries = HashMap::new();
    if !reset {
      for (id, cell) in previous.settled() {
        if let Some(entry) = cell.get()
          && !entry.implicated_by(modified)
          && !entry.consulted_any(&flipped)
        {
          entries.insert(id, cell);
        }
      }
    }

    let kept = entries.len();
    let number = previous.number + 1;
    *current = Arc::new(Epoch::new(number, next_locator, entries));
    info!(
      epoch = number,
      kept,
      dropped = previous.len().saturating_sub(kept),
      deletions_changed = flipped.len(),
      reset,
      "package cache synced"
    );
  }

  /// Stat every file the cached entries depend on, sync with the ones that
  /// changed, and return that set.
  ///
  /// Stamps are taken before a load looks a package up, so an edit made
  /// while the load was running is reported here and the entry reloads.
  ///
  /// # Returns
  ///
  /// The paths whose existence, size or modification time differ from the
  /// recorded stamps; this is the set passed to [`sync`](Self::sync).
  pub fn sync_with_filesystem(&self) -> ModifiedFileSet {
    let epoch = self.current();
    let mut stamps: HashMap<PathBuf, FileStamp> = HashMap::new();
    let mut changed = BTreeSet::new();
    for (_, cell) in epoch.settled() {
      let Some(entry) = cell.get() else {
        continue;
      };
      for (path, recorded) in &entry.deps {
        let now = stamps.entry(path.clone()).or_insert_with(|| FileStamp::of(path));
        if now != recorded {
          changed.insert(path.clone());
        }
      }
    }

    debug!(changed = changed.len(), "checked cached packages against the filesystem");
    let modified = ModifiedFileSet::Paths(changed);
    self.sync(&modified);
    modified
  }

  async fn get_in(&self, epoch: &Arc<Epoch>, id: &PackageId) -> Result<Arc<Package>, PackageError> {
    let cell = epoch.cell(id);
    if cell.initialized() {
      trace!(package = %id, "package cache hit");
    }
    let entry = cell.get_or_try_init(|| self.load(epoch.clone(), id.clone())).await?;
    entry.result.clone()
  }

  /// Run the loader on the blocking pool. The outer error is only for a load
  /// that never finished; it is not memoized.
  async fn load(&self, epoch: Arc<Epoch>, id: PackageId) -> Result<CacheEntry, PackageError> {
    debug!(package = %id, epoch = epoch.number, "loading package");
    let loader = self.loader.clone();
    let package = id.to_string();

    let task = tokio::task::spawn_blocking(move || {
      let lookup = RecordingLookup::new(epoch.as_ref());
      let result = loader.load(&id, &lookup).map(Arc::new);
      let consulted = lookup.into_consulted();
      let deps = consulted.iter().flat_map(|consulted| epoch.stamps(consulted)).collect();
      CacheEntry {
        result,
        consulted,
        deps,
      }
    });

    let entry = task.await.map_err(|e| {
      error!(package = %package, error = %e, "package load task failed");
      PackageError::Interrupted {
        package: package.clone(),
        message: e.to_string(),
      }
    })?;

    match &entry.result {
      Ok(loaded) => {
        for event in loaded.events() {
          self.handler.handle(event);
        }
      }
      Err(e) => debug!(package = %package, error = %e, "package load failed"),
    }
    Ok(entry)
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
