//! pkgload-lib: package loading for a build tool
//!
//! This crate turns a tree of descriptor files into cached packages:
//! - `PackageCache`: epoch-scoped memoization of loaded packages and failures
//! - `PackageLoader`: evaluates one descriptor file into a `Package`
//! - `PackageBoundaryValidator`: decides which package owns a path
//! - `AttributeMapper`: raw and merged views over rule attributes
//! - `TransitivePackageLoader`: parallel walk over everything a label reaches

pub mod attrs;
pub mod boundary;
pub mod cache;
pub mod error;
pub mod eval;
pub mod events;
pub mod label;
pub mod loader;
pub mod locator;
pub mod options;
pub mod package;
pub mod schema;
pub mod transitive;

pub use attrs::{AttributeError, AttributeMapper, Selector, SelectorList};
pub use boundary::{BoundaryCrossing, PackageBoundaryValidator};
pub use cache::{ModifiedFileSet, PackageCache};
pub use error::{NotFoundReason, PackageError};
pub use events::{Event, EventCollector, EventHandler, TracingEventHandler};
pub use label::{Label, PackageId};
pub use loader::PackageLoader;
pub use locator::PackageLocator;
pub use options::PackageCacheOptions;
pub use package::{Package, Rule, Target};
pub use transitive::{TransitivePackageLoader, VisitResult};
