use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What changed on disk since the last sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifiedFileSet {
  /// Drop every cached entry.
  Everything,
  /// Drop entries that depend on one of these paths or on anything below
  /// them. Paths are compared as given, so use the same form as the
  /// package-path roots.
  Paths(BTreeSet<PathBuf>),
}

impl ModifiedFileSet {
  pub fn nothing() -> Self {
    ModifiedFileSet::Paths(BTreeSet::new())
  }

  pub fn paths<I, P>(paths: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    ModifiedFileSet::Paths(paths.into_iter().map(Into::into).collect())
  }

  /// Whether a change to this set invalidates something depending on `path`.
  pub(crate) fn touches(&self, path: &Path) -> bool {
    match self {
      ModifiedFileSet::Everything => true,
      ModifiedFileSet::Paths(changed) => changed.iter().any(|c| path.starts_with(c)),
    }
  }
}

/// Metadata snapshot of a file a cache entry depends on. A missing file is
/// stamped too; its later appearance is a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileStamp {
  exists: bool,
  len: u64,
  modified: Option<SystemTime>,
}

impl FileStamp {
  pub(crate) fn of(path: &Path) -> Self {
    match fs::metadata(path) {
      Ok(metadata) => Self {
        exists: true,
        len: metadata.len(),
        modified: metadata.modified().ok(),
      },
      Err(_) => Self {
        exists: false,
        len: 0,
        modified: None,
      },
    }
  }
}
