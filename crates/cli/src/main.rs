mod cmd;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pkgload_lib::{EventHandler, PackageCache, PackageCacheOptions, TracingEventHandler};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cmd::{cmd_attr, cmd_options, cmd_query, cmd_targets};
use crate::output::{ConsoleEventHandler, print_error};

/// pkgload - load and inspect build packages
#[derive(Parser)]
#[command(name = "pkgload")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output as JSON
  #[arg(long, global = true)]
  json: bool,

  /// Read cache options from a JSON file
  #[arg(long, global = true)]
  options: Option<PathBuf>,

  /// Package path root, searched in the order given (default: current directory)
  #[arg(long = "package-path", global = true)]
  package_path: Vec<PathBuf>,

  /// Packages to treat as deleted
  #[arg(long = "deleted-packages", global = true, value_delimiter = ',')]
  deleted_packages: Vec<String>,

  /// Name of package descriptor files
  #[arg(long = "build-file-name", global = true)]
  build_file_name: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Load everything reachable from the given labels
  Query {
    /// Root labels, e.g. //app:server
    #[arg(required = true)]
    labels: Vec<String>,

    /// Continue past errors and report all of them
    #[arg(short, long)]
    keep_going: bool,

    /// Number of concurrent lookups
    #[arg(short, long)]
    jobs: Option<usize>,
  },

  /// List the targets of a package
  Targets {
    /// Package name, e.g. app/server
    package: String,
  },

  /// Show an attribute of a rule
  Attr {
    /// Rule label
    label: String,

    /// Attribute name
    attribute: String,
  },

  /// Print the effective cache options as JSON
  Options,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let cli = Cli::parse();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  if let Err(e) = rt.block_on(run(cli)) {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
  Ok(())
}

async fn run(cli: Cli) -> Result<()> {
  let options = cache_options(&cli)?;
  debug!(package_path = ?options.package_path, deleted = ?options.deleted_packages, "cache options");
  // With --json, package diagnostics go to the log instead of the terminal.
  let handler: Arc<dyn EventHandler> = if cli.json {
    Arc::new(TracingEventHandler)
  } else {
    Arc::new(ConsoleEventHandler)
  };
  let cache = Arc::new(PackageCache::from_options(&options, handler).context("Invalid cache options")?);

  match cli.command {
    Commands::Query {
      labels,
      keep_going,
      jobs,
    } => {
      let jobs = jobs.unwrap_or(options.parallelism);
      cmd_query(cache, &labels, keep_going, jobs, cli.verbose, cli.json).await
    }
    Commands::Targets { package } => cmd_targets(&cache, &package, cli.json).await,
    Commands::Attr { label, attribute } => cmd_attr(&cache, &label, &attribute, cli.json).await,
    Commands::Options => cmd_options(&options),
  }
}

/// Options file first, then command-line overrides.
fn cache_options(cli: &Cli) -> Result<PackageCacheOptions> {
  let mut options = match &cli.options {
    Some(path) => PackageCacheOptions::load(path)?,
    None => PackageCacheOptions::default(),
  };
  if !cli.package_path.is_empty() {
    options.package_path = cli.package_path.clone();
  }
  if options.package_path.is_empty() {
    options.package_path = vec![std::env::current_dir().context("Failed to get current directory")?];
  }
  options.deleted_packages.extend(cli.deleted_packages.iter().cloned());
  if let Some(name) = &cli.build_file_name {
    options.build_file_name = name.clone();
  }
  Ok(options)
}
