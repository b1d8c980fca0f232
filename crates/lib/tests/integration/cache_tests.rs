//! Package cache behaviour: memoization, negative caching, invalidation.

use std::sync::Arc;

use pkgload_lib::{ModifiedFileSet, PackageCacheOptions, PackageError};

use super::common::{GatedEvaluator, Workspace, id, label, write_under};

#[tokio::test]
async fn same_package_within_an_epoch() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'a', srcs = { 'a.cc' } }\n");
  let cache = ws.cache();

  let first = cache.get_package(&id("a")).await.unwrap();
  let second = cache.get_package(&id("a")).await.unwrap();
  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(first.generation(), second.generation());
  assert_eq!(cache.loader().load_count(), 1);
  assert_eq!(first.build_file(), ws.path("a/BUILD"));
  assert_eq!(first.source_root(), ws.root());
}

#[tokio::test]
async fn missing_package_is_remembered_until_sync() {
  let ws = Workspace::new();
  let cache = ws.cache();

  let err = cache.get_package(&id("nope")).await.unwrap_err();
  assert_eq!(
    err.to_string(),
    "no such package 'nope': BUILD file not found on package path"
  );

  ws.write_file("nope/BUILD", "");
  let again = cache.get_package(&id("nope")).await.unwrap_err();
  assert_eq!(again, err);
  assert_eq!(cache.loader().load_count(), 1);

  cache.sync(&ModifiedFileSet::paths([ws.path("nope/BUILD")]));
  assert!(cache.get_package(&id("nope")).await.is_ok());
  assert_eq!(cache.loader().load_count(), 2);
}

#[tokio::test]
async fn unrelated_sync_keeps_negative_entries() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "");
  let cache = ws.cache();

  assert!(cache.get_package(&id("nope")).await.is_err());
  cache.sync(&ModifiedFileSet::paths([ws.path("a/BUILD")]));
  assert!(cache.get_package(&id("nope")).await.is_err());
  assert_eq!(cache.loader().load_count(), 1);
}

#[tokio::test]
async fn everything_sync_reloads() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'x' }\n");
  let cache = ws.cache();

  let before = cache.get_package(&id("a")).await.unwrap();
  ws.write_file("a/BUILD", "cc_library { name = 'y' }\n");
  assert!(cache.get_package(&id("a")).await.unwrap().target("x").is_ok());

  cache.sync(&ModifiedFileSet::Everything);
  let after = cache.get_package(&id("a")).await.unwrap();
  assert!(!Arc::ptr_eq(&before, &after));
  assert!(after.target("y").is_ok());
  assert!(after.target("x").is_err());
}

#[tokio::test]
async fn invalid_package_name() {
  let ws = Workspace::new();
  let cache = ws.cache();
  let err = cache.get_package_by_name("invalidpackagename&42").await.unwrap_err();
  assert!(
    err
      .to_string()
      .starts_with("no such package 'invalidpackagename&42': Invalid package name 'invalidpackagename&42'"),
    "unexpected message: {}",
    err
  );
  assert!(!cache.is_package_name("invalidpackagename&42"));
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_build_file_is_a_content_error() {
  use std::os::unix::fs::PermissionsExt;

  let ws = Workspace::new();
  let path = ws.write_file("a/BUILD", "cc_library { name = 'a' }\n");
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();
  if std::fs::read(&path).is_ok() {
    // Running with privileges that ignore file modes.
    return;
  }

  let cache = ws.cache();
  let err = cache.get_package(&id("a")).await.unwrap_err();
  assert!(matches!(err, PackageError::Content { .. }));
  let message = err.to_string();
  assert!(
    message.starts_with(&format!("error loading package 'a': {} (", path.display())),
    "{}",
    message
  );
  assert!(message.contains("Permission denied"), "{}", message);

  // Cached failure: identical error without another load.
  assert_eq!(cache.get_package(&id("a")).await.unwrap_err(), err);
  assert_eq!(cache.loader().load_count(), 1);
}

#[tokio::test]
async fn bad_rule_attribute_degrades_the_package() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'a', feet = 'stinky' }\n");
  let cache = ws.cache();

  let package = cache.get_package(&id("a")).await.unwrap();
  assert!(package.contains_errors());
  assert!(
    ws.events
      .contains("//a:a: no such attribute 'feet' in 'cc_library' rule")
  );
  assert!(cache.get_target(&label("//a:a")).await.is_ok());
}

#[tokio::test]
async fn syntax_error_is_an_event_not_a_failure() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'a' \n");
  let cache = ws.cache();

  let package = cache.get_package(&id("a")).await.unwrap();
  assert!(package.contains_errors());
  assert!(package.targets().is_empty());
  assert_eq!(ws.events.events().len(), 1);
}

#[tokio::test]
async fn missing_target_message() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'a' }\n");
  let cache = ws.cache();

  let err = cache.get_target(&label("//a:nope")).await.unwrap_err();
  assert_eq!(
    err.to_string(),
    format!(
      "no such target '//a:nope': target 'nope' not declared in package 'a' defined by {}",
      ws.path("a/BUILD").display()
    )
  );
  // The package itself is still a success.
  assert!(cache.get_package(&id("a")).await.is_ok());
}

#[tokio::test]
async fn touched_file_reloads_after_filesystem_sync() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'a' }\n");
  ws.write_file("b/BUILD", "cc_library { name = 'b' }\n");
  let cache = ws.cache();

  let a = cache.get_package(&id("a")).await.unwrap();
  let b = cache.get_package(&id("b")).await.unwrap();

  ws.touch("a/BUILD");
  let modified = cache.sync_with_filesystem();
  assert_eq!(modified, ModifiedFileSet::paths([ws.path("a/BUILD")]));

  let reloaded = cache.get_package(&id("a")).await.unwrap();
  assert!(!Arc::ptr_eq(&a, &reloaded));
  assert_ne!(a.generation(), reloaded.generation());
  assert_eq!(a.targets().keys().collect::<Vec<_>>(), reloaded.targets().keys().collect::<Vec<_>>());
  assert!(Arc::ptr_eq(&b, &cache.get_package(&id("b")).await.unwrap()));
}

#[tokio::test]
async fn filesystem_sync_without_changes_keeps_everything() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "");
  let cache = ws.cache();

  let a = cache.get_package(&id("a")).await.unwrap();
  assert!(cache.get_package(&id("missing")).await.is_err());
  assert_eq!(cache.sync_with_filesystem(), ModifiedFileSet::nothing());
  assert!(Arc::ptr_eq(&a, &cache.get_package(&id("a")).await.unwrap()));
  assert!(cache.get_package(&id("missing")).await.is_err());
  assert_eq!(cache.loader().load_count(), 2);
}

#[tokio::test]
async fn filesystem_sync_sees_created_and_deleted_files() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "");
  let cache = ws.cache();

  assert!(cache.get_package(&id("new")).await.is_err());
  assert!(cache.get_package(&id("a")).await.is_ok());

  ws.write_file("new/BUILD", "");
  ws.delete_file("a/BUILD");
  cache.sync_with_filesystem();

  assert!(cache.get_package(&id("new")).await.is_ok());
  assert!(cache.get_package(&id("a")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn package_path_order_decides() {
  let ws = Workspace::new();
  let second = ws.other_root("second");
  ws.write_file("shared/BUILD", "cc_library { name = 'from_first' }\n");
  write_under(&second, "shared/BUILD", "cc_library { name = 'from_second' }\n");
  write_under(&second, "only_second/BUILD", "");
  let cache = ws.cache_with_roots(vec![ws.root(), second.clone()]);

  let shared = cache.get_package(&id("shared")).await.unwrap();
  assert!(shared.target("from_first").is_ok());
  assert_eq!(shared.source_root(), ws.root());

  let only_second = cache.get_package(&id("only_second")).await.unwrap();
  assert_eq!(only_second.source_root(), second);
}

#[tokio::test]
async fn package_path_change_applies_at_sync() {
  let ws = Workspace::new();
  let second = ws.other_root("second");
  write_under(&second, "p/BUILD", "");
  let cache = ws.cache();

  assert!(cache.get_package(&id("p")).await.is_err());
  cache.set_package_path(vec![ws.root(), second.clone()]);
  assert!(cache.get_package(&id("p")).await.is_err());

  cache.sync(&ModifiedFileSet::nothing());
  assert!(cache.get_package(&id("p")).await.is_ok());
}

#[tokio::test]
async fn deleted_packages_change_keeps_unrelated_entries() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'a' }\n");
  ws.write_file("c/BUILD", "filegroup { name = 'c', srcs = { 'd/x' } }\n");
  ws.write_file("c/d/BUILD", "");
  let cache = ws.cache();

  let a = cache.get_package(&id("a")).await.unwrap();
  assert!(cache.get_package(&id("c")).await.unwrap().contains_errors());
  assert_eq!(cache.loader().load_count(), 2);

  cache.set_deleted_packages([id("c/d")]);
  cache.sync(&ModifiedFileSet::nothing());

  assert!(Arc::ptr_eq(&a, &cache.get_package(&id("a")).await.unwrap()));
  assert_eq!(cache.loader().load_count(), 2);
  // `c` looked at `c/d` while loading, so it is reloaded.
  assert!(!cache.get_package(&id("c")).await.unwrap().contains_errors());
  assert_eq!(cache.loader().load_count(), 3);
}

#[tokio::test]
async fn is_package_does_not_load() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'a' }\n");
  let cache = ws.cache();

  assert!(cache.is_package(&id("a")));
  assert!(!cache.is_package(&id("b")));
  assert_eq!(cache.loader().load_count(), 0);
}

#[tokio::test]
async fn cache_from_options() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "");
  ws.write_file("a/gone/BUILD", "");
  let json = serde_json::json!({
    "package_path": [ws.root()],
    "deleted_packages": ["a/gone"],
  })
  .to_string();
  let options = PackageCacheOptions::from_json(&json).unwrap();
  let cache = pkgload_lib::PackageCache::from_options(&options, ws.events.clone()).unwrap();

  assert!(cache.is_package(&id("a")));
  assert!(!cache.is_package(&id("a/gone")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn edit_during_load_is_found_by_filesystem_sync() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'old' }\n");
  let gate = GatedEvaluator::new();
  let cache = Arc::new(ws.gated_cache(&gate));

  let loading = tokio::spawn({
    let cache = cache.clone();
    async move { cache.get_package(&id("a")).await }
  });
  gate.wait_for_calls(1).await;
  ws.write_file("a/BUILD", "cc_library { name = 'new_longer_name' }\n");
  gate.open();

  let stale = loading.await.unwrap().unwrap();
  assert!(stale.target("old").is_ok());

  assert_eq!(
    cache.sync_with_filesystem(),
    ModifiedFileSet::paths([ws.path("a/BUILD")])
  );
  let fresh = cache.get_package(&id("a")).await.unwrap();
  assert!(fresh.target("new_longer_name").is_ok());
  assert!(fresh.target("old").is_err());
  assert_eq!(gate.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_during_load_starts_a_fresh_load() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "cc_library { name = 'old' }\n");
  let gate = GatedEvaluator::new();
  let cache = Arc::new(ws.gated_cache(&gate));

  let before = tokio::spawn({
    let cache = cache.clone();
    async move { cache.get_package(&id("a")).await }
  });
  gate.wait_for_calls(1).await;

  ws.write_file("a/BUILD", "cc_library { name = 'new' }\n");
  cache.sync(&ModifiedFileSet::paths([ws.path("a/BUILD")]));

  let after = tokio::spawn({
    let cache = cache.clone();
    async move { cache.get_package(&id("a")).await }
  });
  gate.wait_for_calls(2).await;
  gate.open();

  let old = before.await.unwrap().unwrap();
  let new = after.await.unwrap().unwrap();
  assert!(old.target("old").is_ok());
  assert!(old.target("new").is_err());
  assert!(new.target("new").is_ok());
  assert_ne!(new.generation(), old.generation());
  assert_eq!(gate.calls(), 2);

  // The in-flight result of the earlier epoch is not stored in the new one.
  assert!(Arc::ptr_eq(&new, &cache.get_package(&id("a")).await.unwrap()));
  assert_eq!(gate.calls(), 2);
}
