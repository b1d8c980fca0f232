//! Parallel transitive loading.
//!
//! Starting from a set of labels, resolve each to a target through the
//! cache and follow its dependencies: every label of every non-output
//! attribute, all `select()` branches included, and for a generated file the
//! rule that produces it. Each label is visited at most once; the cache
//! additionally makes sure each package is loaded at most once.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::PackageCache;
use crate::error::PackageError;
use crate::label::{Label, PackageId};
use crate::package::{FileKind, Target};

/// A failure reached while visiting `label`, through the edge from `from`
/// (`None` for a root). A package that loaded with errors is reported once,
/// at the first label that reached it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitError {
  pub from: Option<Label>,
  pub label: Label,
  pub error: PackageError,
}

#[derive(Debug, Default)]
pub struct VisitResult {
  pub visited_packages: BTreeSet<PackageId>,
  pub visited_targets: BTreeSet<Label>,
  pub errors: Vec<VisitError>,
}

impl VisitResult {
  pub fn is_success(&self) -> bool {
    self.errors.is_empty()
  }
}

struct Visited {
  from: Option<Label>,
  label: Label,
  outcome: Result<(Arc<Target>, bool), PackageError>,
}

pub struct TransitivePackageLoader {
  cache: Arc<PackageCache>,
}

impl TransitivePackageLoader {
  pub fn new(cache: Arc<PackageCache>) -> Self {
    Self { cache }
  }

  /// Visit everything reachable from `roots` with at most `parallelism`
  /// lookups in flight. With `keep_going` every error is collected;
  /// otherwise nothing new is scheduled after the first one and the lookups
  /// already running are drained.
  ///
  /// # Arguments
  ///
  /// * `roots` - Labels to start from; each is visited once however often it repeats
  /// * `keep_going` - Continue past errors instead of stopping at the first
  /// * `parallelism` - Upper bound on concurrent target lookups (at least 1)
  ///
  /// # Returns
  ///
  /// Every package and target reached, plus one [`VisitError`] per failed
  /// lookup with the label that referenced it.
  pub async fn visit(&self, roots: impl IntoIterator<Item = Label>, keep_going: bool, parallelism: usize) -> VisitResult {
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut join_set = JoinSet::new();
    let mut seen = HashSet::new();
    let mut broken_packages = HashSet::new();
    let mut result = VisitResult::default();
    let mut aborted = false;

    for root in roots {
      if seen.insert(root.clone()) {
        self.spawn(&mut join_set, &semaphore, None, root);
      }
    }

    while let Some(joined) = join_set.join_next().await {
      let visited = match joined {
        Ok(visited) => visited,
        Err(e) => {
          error!(error = %e, "visit task panicked");
          continue;
        }
      };

      let (target, contains_errors) = match visited.outcome {
        Ok(found) => found,
        Err(error) => {
          warn!(label = %visited.label, error = %error, "failed to load dependency");
          result.errors.push(VisitError {
            from: visited.from,
            label: visited.label,
            error,
          });
          aborted |= !keep_going;
          continue;
        }
      };

      result.visited_packages.insert(visited.label.package().clone());
      result.visited_targets.insert(visited.label.clone());
      if contains_errors && broken_packages.insert(visited.label.package().clone()) {
        result.errors.push(VisitError {
          from: visited.from.clone(),
          label: visited.label.clone(),
          error: PackageError::ContainsErrors {
            package: visited.label.package().to_string(),
          },
        });
        aborted |= !keep_going;
      }
      if aborted {
        continue;
      }

      for dep in dependencies(&target) {
        if seen.insert(dep.clone()) {
          self.spawn(&mut join_set, &semaphore, Some(visited.label.clone()), dep);
        }
      }
    }

    info!(
      packages = result.visited_packages.len(),
      targets = result.visited_targets.len(),
      errors = result.errors.len(),
      aborted,
      "transitive visit finished"
    );
    result
  }

  fn spawn(&self, join_set: &mut JoinSet<Visited>, semaphore: &Arc<Semaphore>, from: Option<Label>, label: Label) {
    let cache = self.cache.clone();
    let semaphore = semaphore.clone();
    debug!(%label, "scheduling visit");
    join_set.spawn(async move {
      let _permit = semaphore.acquire().await;
      let outcome = async {
        let package = cache.get_package(label.package()).await?;
        let target = cache.get_target(&label).await?;
        Ok::<_, PackageError>((target, package.contains_errors()))
      }
      .await;
      Visited { from, label, outcome }
    });
  }
}

/// Labels a target depends on, in attribute order, without repeats.
fn dependencies(target: &Target) -> Vec<Label> {
  match target {
    Target::Rule(rule) => {
      let mut seen = HashSet::new();
      let mut deps = Vec::new();
      rule.mapper().visit_all_labels(|label, attribute| {
        if !attribute.ty().is_output() && seen.insert(label) {
          deps.push(label.clone());
        }
      });
      deps
    }
    Target::File(file) => match file.kind() {
      FileKind::Generated { rule } => vec![rule.clone()],
      FileKind::Source => Vec::new(),
    },
  }
}
