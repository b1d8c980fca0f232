//! Subpackage boundaries and the deleted-packages override.

use pkgload_lib::{ModifiedFileSet, PackageError};

use super::common::{Workspace, id, label, write_under};

#[tokio::test]
async fn label_crossing_into_subpackage() {
  let ws = Workspace::new();
  ws.write_file("e/BUILD", "filegroup { name = 'fg', srcs = { 'f/g' } }\n");
  ws.write_file("e/f/BUILD", "filegroup { name = 'g' }\n");
  let cache = ws.cache();

  let err = cache.get_target(&label("//e:f/g")).await.unwrap_err();
  let PackageError::CrossesSubpackageBoundary(crossing) = &err else {
    panic!("unexpected error: {}", err);
  };
  assert_eq!(crossing.subpackage, id("e/f"));
  assert_eq!(
    err.to_string(),
    "Label '//e:f/g' crosses boundary of subpackage 'e/f' (perhaps you meant to put the colon here: '//e/f:g'?)"
  );

  assert!(cache.get_target(&label("//e/f:g")).await.is_ok());

  // Reported while loading `e` too, since `fg` references the path.
  assert!(cache.get_package(&id("e")).await.unwrap().contains_errors());
  assert!(ws.events.contains("crosses boundary of subpackage 'e/f'"));
}

#[tokio::test]
async fn plain_subdirectory_files_belong_to_the_package() {
  let ws = Workspace::new();
  ws.write_file("e/BUILD", "filegroup { name = 'fg', srcs = { 'f/g' } }\n");
  let cache = ws.cache();

  let target = cache.get_target(&label("//e:f/g")).await.unwrap();
  assert_eq!(target.kind_name(), "source file");
  assert!(!cache.get_package(&id("e")).await.unwrap().contains_errors());
}

#[tokio::test]
async fn new_subpackage_invalidates_the_parent_that_referenced_it() {
  let ws = Workspace::new();
  ws.write_file("e/BUILD", "filegroup { name = 'fg', srcs = { 'f/g' } }\n");
  let cache = ws.cache();
  assert!(cache.get_target(&label("//e:f/g")).await.is_ok());

  ws.write_file("e/f/BUILD", "");
  cache.sync(&ModifiedFileSet::paths([ws.path("e/f/BUILD")]));

  let err = cache.get_target(&label("//e:f/g")).await.unwrap_err();
  assert!(matches!(err, PackageError::CrossesSubpackageBoundary(_)));
  assert!(cache.get_package(&id("e")).await.unwrap().contains_errors());
}

#[tokio::test]
async fn rule_names_are_boundary_checked() {
  let ws = Workspace::new();
  ws.write_file("e/BUILD", "filegroup { name = 'f/rule' }\n");
  ws.write_file("e/f/BUILD", "");
  let cache = ws.cache();

  let package = cache.get_package(&id("e")).await.unwrap();
  assert!(package.contains_errors());
  assert!(package.target("f/rule").is_err());
}

#[tokio::test]
async fn deleted_package_becomes_plain_directory() {
  let ws = Workspace::new();
  ws.write_file("c/BUILD", "filegroup { name = 'c', srcs = { 'd/x' } }\n");
  ws.write_file("c/d/BUILD", "filegroup { name = 'd' }\n");
  ws.write_file("c/d/x", "");
  let cache = ws.cache();

  assert!(cache.is_package(&id("c/d")));
  assert!(matches!(
    cache.get_target(&label("//c:d/x")).await,
    Err(PackageError::CrossesSubpackageBoundary(_))
  ));

  cache.set_deleted_packages([id("c/d")]);
  // Not before the next sync.
  assert!(cache.is_package(&id("c/d")));

  cache.sync(&ModifiedFileSet::nothing());
  assert!(!cache.is_package(&id("c/d")));
  assert_eq!(
    cache.get_package(&id("c/d")).await.unwrap_err().to_string(),
    "no such package 'c/d': Package is considered deleted due to --deleted_packages"
  );
  let target = cache.get_target(&label("//c:d/x")).await.unwrap();
  assert_eq!(target.kind_name(), "source file");
  assert!(!cache.get_package(&id("c")).await.unwrap().contains_errors());

  cache.set_deleted_packages([]);
  cache.sync(&ModifiedFileSet::nothing());
  assert!(cache.is_package(&id("c/d")));
  assert!(matches!(
    cache.get_target(&label("//c:d/x")).await,
    Err(PackageError::CrossesSubpackageBoundary(_))
  ));
}

#[tokio::test]
async fn subpackage_on_another_root_suggests_deleting_it() {
  let ws = Workspace::new();
  let other = ws.other_root("other");
  ws.write_file("c/BUILD", "filegroup { name = 'c' }\n");
  write_under(&other, "c/d/BUILD", "");
  let cache = ws.cache_with_roots(vec![ws.root(), other]);

  let err = cache.get_target(&label("//c:d/x")).await.unwrap_err();
  assert_eq!(
    err.to_string(),
    "Label '//c:d/x' crosses boundary of subpackage 'c/d' (have you deleted c/d/BUILD? If so, use the --deleted_packages=c/d option)"
  );
}

#[tokio::test]
async fn boundary_errors_are_not_memoized_as_package_failures() {
  let ws = Workspace::new();
  ws.write_file("e/BUILD", "filegroup { name = 'e' }\n");
  ws.write_file("e/f/BUILD", "");
  let cache = ws.cache();

  assert!(cache.get_target(&label("//e:f/g")).await.is_err());
  assert!(cache.get_target(&label("//e:e")).await.is_ok());
  assert!(cache.get_package(&id("e")).await.is_ok());
  assert_eq!(cache.loader().load_count(), 1);
}

#[tokio::test]
async fn output_crossing_subpackage_with_repeated_package_path_entry() {
  let ws = Workspace::new();
  ws.write_file("x/y/BUILD", "");
  ws.write_file(
    "x/BUILD",
    "genrule { name = 'x', srcs = {}, outs = { 'y/z.h' }, cmd = '' }\n",
  );
  let cache = ws.cache_with_roots(vec![ws.root(), ws.root()]);

  let package = cache.get_package(&id("x")).await.unwrap();
  assert!(package.contains_errors());
  assert!(package.target("x").is_ok());
  assert!(package.target("y/z.h").is_err());
  assert!(ws.events.contains(
    "Label '//x:y/z.h' crosses boundary of subpackage 'x/y' (perhaps you meant to put the colon here: '//x/y:z.h'?)"
  ));
}
