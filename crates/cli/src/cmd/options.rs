//! Implementation of the `pkgload options` command.

use anyhow::{Context, Result};
use pkgload_lib::PackageCacheOptions;

/// Print the options the other commands would build their cache from.
pub fn cmd_options(options: &PackageCacheOptions) -> Result<()> {
  let json = options.to_json().context("Failed to serialize options")?;
  println!("{}", json);
  Ok(())
}
