//! Multi-package builds: libraries linked against each other after building.

use twinpack_lib::build::build;
use twinpack_lib::config::ConfigLayers;
use twinpack_lib::link::{LibraryDescriptor, LinkOptions, link};

use super::common::Project;

const CONFIG: &str = r#"{
  "entries": [
    { "input": "libs/a/", "outDir": "dist/a" },
    { "input": "libs/b/", "outDir": "dist/b" }
  ],
  "libraries": [
    { "packageName": "@org/a", "mainFile": "libs/a/index.ts", "sourceDir": "libs/a" },
    { "packageName": "@org/b", "mainFile": "libs/b/index.ts", "sourceDir": "libs/b" }
  ]
}"#;

fn workspace() -> Project {
  let project = Project::new();
  project
    .write("package.json", r#"{ "name": "@org/root", "version": "1.0.0" }"#)
    .write("twinpack.json", CONFIG)
    .write(
      "libs/a/index.ts",
      "import { thing } from '~/libs/b/thing';\nimport { helper } from '../../shared/helper';\nexport const a = thing + helper;\n",
    )
    .write("libs/a/own.ts", "export { a } from '~/libs/a/index';\n")
    .write("libs/b/index.ts", "export * from './thing';\n")
    .write("libs/b/thing.ts", "export const thing = 1;\n")
    .write("shared/helper.ts", "export const helper = 2;\n");
  project
}

fn layers(project: &Project) -> ConfigLayers {
  ConfigLayers::discover(project.root(), None, Default::default()).unwrap()
}

#[tokio::test]
async fn cross_library_alias_becomes_package_name() {
  let project = workspace();

  let report = build(project.root(), false, layers(&project)).await.unwrap();

  let a = project.read("dist/a/index.mjs");
  assert!(a.contains("from '@org/b'"), "{}", a);
  assert!(a.contains("from './_external/shared_helper'"), "{}", a);
  assert_eq!(project.read("dist/a/own.mjs"), "export { a } from './index.mjs';\n");
  assert_eq!(project.read("dist/b/index.mjs"), "export * from './thing.mjs';\n");

  assert!(project.path("dist/a/_external/shared_helper.ts").exists());
  assert!(report.manifest.contains("dist/a/_external/shared_helper.ts"));
  assert_eq!(report.linked.len(), 2);
  assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[tokio::test]
async fn linking_a_linked_tree_changes_nothing() {
  let project = workspace();
  build(project.root(), false, layers(&project)).await.unwrap();
  let before = project.read("dist/a/index.mjs");

  let libraries = ["a", "b"]
    .iter()
    .map(|name| LibraryDescriptor {
      package_name: format!("@org/{}", name),
      main_file: project.path(&format!("libs/{}/index.ts", name)),
      source_dir: project.path(&format!("libs/{}", name)),
      out_dir: project.path(&format!("dist/{}", name)),
    })
    .collect();
  let result = link(&LinkOptions::new(project.root(), libraries)).unwrap();

  assert!(result.modified.is_empty(), "{:?}", result.modified);
  assert!(result.copied.is_empty());
  assert_eq!(project.read("dist/a/index.mjs"), before);
}

#[tokio::test]
async fn missing_alias_target_is_fatal() {
  let project = workspace();
  project.write("libs/a/broken.ts", "import x from '~/libs/nowhere/x';\n");

  let err = build(project.root(), false, layers(&project)).await.unwrap_err();
  assert!(err.to_string().contains("~/libs/nowhere/x"), "{}", err);
}
