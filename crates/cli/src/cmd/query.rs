//! Implementation of the `pkgload query` command.
//!
//! Loads everything reachable from the given labels and reports what was
//! visited and every error on the way.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use pkgload_lib::{Label, PackageCache, TransitivePackageLoader};

use crate::output::{print_error, print_json, print_stat, print_success, symbols};

pub async fn cmd_query(
  cache: Arc<PackageCache>,
  labels: &[String],
  keep_going: bool,
  jobs: usize,
  verbose: bool,
  json: bool,
) -> Result<()> {
  let roots = labels
    .iter()
    .map(|l| Label::parse(l).with_context(|| format!("Invalid label: {}", l)))
    .collect::<Result<Vec<_>>>()?;

  let result = TransitivePackageLoader::new(cache).visit(roots, keep_going, jobs).await;

  if json {
    let errors: Vec<_> = result
      .errors
      .iter()
      .map(|e| {
        serde_json::json!({
          "from": e.from.as_ref().map(ToString::to_string),
          "label": e.label.to_string(),
          "message": e.error.to_string(),
        })
      })
      .collect();
    print_json(&serde_json::json!({
      "packages": result.visited_packages.iter().map(ToString::to_string).collect::<Vec<_>>(),
      "targets": result.visited_targets.iter().map(ToString::to_string).collect::<Vec<_>>(),
      "errors": errors,
    }))?;
  } else {
    if verbose {
      for target in &result.visited_targets {
        println!("{}", target);
      }
    }
    for error in &result.errors {
      match &error.from {
        Some(from) => print_error(&format!("{} {} {}: {}", from, symbols::ARROW, error.label, error.error)),
        None => print_error(&format!("{}: {}", error.label, error.error)),
      }
    }
    if result.is_success() {
      print_success("Loading complete");
    }
    print_stat("Packages", &result.visited_packages.len().to_string());
    print_stat("Targets", &result.visited_targets.len().to_string());
  }

  if !result.is_success() {
    bail!("{} error(s) while loading", result.errors.len());
  }
  Ok(())
}
