//! Transitive loading over the dependency graph.

use std::sync::Arc;

use pkgload_lib::{PackageError, TransitivePackageLoader};

use super::common::{Workspace, id, label};

fn loader(ws: &Workspace) -> (Arc<pkgload_lib::PackageCache>, TransitivePackageLoader) {
  let cache = Arc::new(ws.cache());
  let loader = TransitivePackageLoader::new(cache.clone());
  (cache, loader)
}

#[tokio::test]
async fn visits_everything_reachable() {
  let ws = Workspace::new();
  ws.write_file(
    "app/BUILD",
    "sh_binary { name = 'app', srcs = { 'app.sh' }, deps = { '//lib:lib' } }\n",
  );
  ws.write_file(
    "lib/BUILD",
    "sh_library { name = 'lib', srcs = { 'lib.sh' }, data = { '//data:files' } }\n",
  );
  ws.write_file("data/BUILD", "filegroup { name = 'files', srcs = { 'a.txt' } }\n");
  ws.write_file("unrelated/BUILD", "filegroup { name = 'x' }\n");
  let (cache, loader) = loader(&ws);

  let result = loader.visit([label("//app:app")], false, 4).await;
  assert!(result.is_success(), "{:?}", result.errors);
  assert_eq!(
    result.visited_packages.into_iter().collect::<Vec<_>>(),
    vec![id("app"), id("data"), id("lib")]
  );
  assert!(result.visited_targets.contains(&label("//app:app.sh")));
  assert!(result.visited_targets.contains(&label("//data:a.txt")));
  assert_eq!(result.visited_targets.len(), 6);
  assert_eq!(cache.loader().load_count(), 3);
}

#[tokio::test]
async fn keep_going_collects_every_missing_package() {
  let ws = Workspace::new();
  ws.write_file(
    "a/BUILD",
    "filegroup { name = 'a', srcs = { '//missing1:x', '//missing2:y', 'ok.txt' } }\n",
  );
  let (_cache, loader) = loader(&ws);

  let result = loader.visit([label("//a:a")], true, 2).await;
  assert_eq!(result.errors.len(), 2);
  for error in &result.errors {
    assert_eq!(error.from, Some(label("//a:a")));
    assert!(error.error.is_not_found(), "{}", error.error);
  }
  assert!(result.visited_targets.contains(&label("//a:ok.txt")));
}

#[tokio::test]
async fn broken_dependency_package_is_reported() {
  let ws = Workspace::new();
  ws.write_file("a/BUILD", "filegroup { name = 'a', srcs = { '//b:b' } }\n");
  ws.write_file(
    "b/BUILD",
    "filegroup { name = 'b', srcs = { 'b.txt' } }\nfilegroup { name = 'bad', feet = 1 }\n",
  );
  let (_cache, loader) = loader(&ws);

  let result = loader.visit([label("//a:a")], true, 4).await;
  assert_eq!(result.errors.len(), 1);
  let error = &result.errors[0];
  assert_eq!(error.label, label("//b:b"));
  assert_eq!(error.from, Some(label("//a:a")));
  assert_eq!(
    error.error,
    PackageError::ContainsErrors {
      package: "b".to_string()
    }
  );
  // The target itself still loaded and its deps were followed.
  assert!(result.visited_targets.contains(&label("//b:b.txt")));
}

#[tokio::test]
async fn fail_fast_stops_at_a_broken_root() {
  let ws = Workspace::new();
  ws.write_file(
    "a/BUILD",
    "filegroup { name = 'a', srcs = { '//b:b' } }\nfilegroup { name = 'bad', feet = 1 }\n",
  );
  ws.write_file("b/BUILD", "filegroup { name = 'b' }\n");
  let (cache, loader) = loader(&ws);

  let result = loader.visit([label("//a:a")], false, 4).await;
  assert!(!result.is_success());
  assert!(!result.visited_packages.contains(&id("b")));
  assert_eq!(cache.loader().load_count(), 1);

  let result = loader.visit([label("//a:a")], true, 4).await;
  assert_eq!(result.errors.len(), 1);
  assert!(result.visited_packages.contains(&id("b")));
}

#[tokio::test]
async fn generated_file_depends_on_its_rule() {
  let ws = Workspace::new();
  ws.write_file(
    "gen/BUILD",
    "genrule { name = 'gen', srcs = { '//tools:input' }, outs = { 'out.h' }, cmd = 'touch $@' }\n",
  );
  ws.write_file("tools/BUILD", "filegroup { name = 'input' }\n");
  let (_cache, loader) = loader(&ws);

  let result = loader.visit([label("//gen:out.h")], false, 4).await;
  assert!(result.is_success(), "{:?}", result.errors);
  assert!(result.visited_targets.contains(&label("//gen:gen")));
  assert!(result.visited_targets.contains(&label("//tools:input")));
}

#[tokio::test]
async fn every_select_branch_is_followed() {
  let ws = Workspace::new();
  ws.write_file(
    "a/BUILD",
    r#"
sh_library {
  name = "a",
  deps = select {
    { "//conditions:linux", { "//linux:dep" } },
    { "//conditions:default", { "//other:dep" } },
  },
}
"#,
  );
  ws.write_file("linux/BUILD", "sh_library { name = 'dep' }\n");
  ws.write_file("other/BUILD", "sh_library { name = 'dep' }\n");
  let (_cache, loader) = loader(&ws);

  let result = loader.visit([label("//a:a")], false, 4).await;
  assert!(result.is_success(), "{:?}", result.errors);
  assert!(result.visited_packages.contains(&id("linux")));
  assert!(result.visited_packages.contains(&id("other")));
}

#[tokio::test]
async fn diamond_loads_each_package_once() {
  let ws = Workspace::new();
  ws.write_file("top/BUILD", "filegroup { name = 'top', srcs = { '//left:l', '//right:r' } }\n");
  ws.write_file("left/BUILD", "filegroup { name = 'l', srcs = { '//base:b' } }\n");
  ws.write_file("right/BUILD", "filegroup { name = 'r', srcs = { '//base:b' } }\n");
  ws.write_file(
    "base/BUILD",
    "filegroup { name = 'b', srcs = { 'one', 'two', 'three' } }\n",
  );
  let (cache, loader) = loader(&ws);

  let result = loader.visit([label("//top:top")], false, 8).await;
  assert!(result.is_success(), "{:?}", result.errors);
  assert_eq!(result.visited_packages.len(), 4);
  assert_eq!(cache.loader().load_count(), 4);

  // A second visit is served entirely from the cache.
  loader.visit([label("//top:top")], false, 8).await;
  assert_eq!(cache.loader().load_count(), 4);
}
