//! Implementation of the `pkgload targets` command.

use anyhow::Result;
use pkgload_lib::PackageCache;

use crate::output::{print_info, print_json, print_stat, print_warning, symbols};

pub async fn cmd_targets(cache: &PackageCache, package: &str, json: bool) -> Result<()> {
  let package = cache.get_package_by_name(package).await?;

  if json {
    let targets: Vec<_> = package
      .targets()
      .values()
      .map(|t| serde_json::json!({ "label": t.label().to_string(), "kind": t.kind_name() }))
      .collect();
    print_json(&serde_json::json!({
      "package": package.name(),
      "build_file": package.build_file(),
      "contains_errors": package.contains_errors(),
      "features": package.features(),
      "targets": targets,
      "events": package.events(),
    }))?;
    return Ok(());
  }

  print_info(&format!("Package {}", package.id()));
  print_stat("Defined by", &package.build_file().display().to_string());
  if !package.features().is_empty() {
    print_stat("Features", &package.features().join(", "));
  }
  println!();
  for target in package.targets().values() {
    println!("  {} {} ({})", symbols::INFO, target.label(), target.kind_name());
  }
  if package.contains_errors() {
    println!();
    print_warning("Package contains errors");
  }
  Ok(())
}
