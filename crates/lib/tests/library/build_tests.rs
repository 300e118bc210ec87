//! Single-package builds.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use twinpack_lib::build::backends::{BackendEnv, BundleBackend};
use twinpack_lib::build::{BuildEntry, BuildError, Builder, build};
use twinpack_lib::config::ConfigLayers;
use twinpack_lib::transform::declarations::{DeclarationExtractor, DeclarationOutput, ExtractOptions};

use super::common::Project;

fn layers(project: &Project) -> ConfigLayers {
  ConfigLayers::discover(project.root(), None, Default::default()).unwrap()
}

/// Declares every exported const as `unknown`.
struct ConstExtractor;

#[async_trait]
impl DeclarationExtractor for ConstExtractor {
  async fn extract(
    &self,
    files: &BTreeMap<PathBuf, String>,
    _options: &ExtractOptions,
  ) -> HashMap<PathBuf, DeclarationOutput> {
    files
      .iter()
      .map(|(path, source)| {
        let contents = source
          .lines()
          .filter_map(|l| l.strip_prefix("export const "))
          .filter_map(|l| l.split_whitespace().next())
          .map(|name| format!("export declare const {}: unknown;\n", name))
          .collect::<String>();
        (
          path.clone(),
          DeclarationOutput {
            contents: Some(contents),
            errors: vec![],
          },
        )
      })
      .collect()
  }
}

#[tokio::test]
async fn extensionless_imports_follow_the_esm_extension() {
  let project = Project::new();
  project
    .write("src/index.ts", "export { helper } from './helper';\n")
    .write("src/helper.ts", "export const helper = 1;\n");

  build(project.root(), false, layers(&project)).await.unwrap();
  assert_eq!(project.read("dist/index.mjs"), "export { helper } from './helper.mjs';\n");

  project.write("twinpack.json", r#"{ "transform": { "esmExtension": ".js" } }"#);
  build(project.root(), false, layers(&project)).await.unwrap();
  assert_eq!(project.read("dist/index.js"), "export { helper } from './helper.js';\n");
  assert!(!project.path("dist/index.mjs").exists(), "stale output survived the clean");
}

#[tokio::test]
async fn colliding_sources_fail_without_writing() {
  let project = Project::new();
  project
    .write("src/a.ts", "export const a = 1;\n")
    .write("src/a.tsx", "export const a = 2;\n");

  let err = build(project.root(), false, layers(&project)).await.unwrap_err();
  let message = err.to_string();
  assert!(matches!(err, BuildError::Transform { .. }));
  assert!(message.contains("a.ts ") && message.contains("a.tsx"), "{}", message);
  assert!(!project.path("dist/a.mjs").exists());
}

#[tokio::test]
async fn unused_dependency_fails_the_build() {
  let project = Project::new();
  project
    .write("package.json", r#"{ "name": "demo", "dependencies": { "left-pad": "^1.3.0" } }"#)
    .write("src/index.ts", "export const a = 1;\n");

  let err = build(project.root(), false, layers(&project)).await.unwrap_err();
  assert!(matches!(err, BuildError::Warnings { count: 1, .. }));
  assert!(err.to_string().contains("left-pad"));
}

#[tokio::test]
async fn declarations_feed_registry_entry_points() {
  let project = Project::new();
  project
    .write("package.json", r#"{ "name": "@scope/demo", "version": "2.0.0", "license": "MIT" }"#)
    .write(
      "twinpack.json",
      r#"{
        "declaration": true,
        "registries": ["npm", "jsr"],
        "entries": [
          { "input": "src/" },
          { "input": "src/cli.ts", "outDir": "dist/bin" }
        ]
      }"#,
    )
    .write("src/index.ts", "export const version = 2;\n")
    .write("src/cli.ts", "export const run = 1;\n");

  let report = Builder::new()
    .with_extractor(Arc::new(ConstExtractor))
    .build(project.root(), false, layers(&project))
    .await
    .unwrap();

  assert!(report.errors.is_empty(), "{:?}", report.errors);
  assert_eq!(
    project.read("dist/index.d.mts"),
    "export declare const version: unknown;\n"
  );

  let npm: serde_json::Value = serde_json::from_str(&project.read("dist/package.json")).unwrap();
  assert_eq!(npm["name"], "@scope/demo");
  assert_eq!(npm["license"], "MIT");
  assert_eq!(npm["exports"]["."]["import"], "./index.mjs");
  assert_eq!(npm["exports"]["."]["types"], "./index.d.mts");
  assert_eq!(npm["exports"]["./bin/cli"]["import"], "./bin/cli.mjs");

  let jsr: serde_json::Value = serde_json::from_str(&project.read("dist/jsr.json")).unwrap();
  assert_eq!(jsr["exports"]["."], "./index.mjs");
}

#[tokio::test]
async fn spec_generate_and_copy_entries() {
  let project = Project::new();
  project
    .write(
      "twinpack.json",
      r#"{
        "entries": [
          { "input": "src/", "builder": "spec-generate", "outDir": "types" },
          { "input": "public/", "builder": "copy", "outDir": "dist/public" }
        ]
      }"#,
    )
    .write("src/index.ts", "export const a = 1;\n")
    .write("public/robots.txt", "User-agent: *\n");

  let report = Builder::new()
    .with_extractor(Arc::new(ConstExtractor))
    .build(project.root(), false, layers(&project))
    .await
    .unwrap();

  assert!(project.path("types/index.d.mts").exists());
  assert!(!project.path("types/index.mjs").exists());
  assert_eq!(project.read("dist/public/robots.txt"), "User-agent: *\n");
  assert!(report.manifest.named().next().is_none(), "copies and declarations are chunks");
}

struct Banner;

#[async_trait]
impl BundleBackend for Banner {
  fn name(&self) -> &str {
    "banner"
  }

  async fn bundle(&self, entry: &BuildEntry, _env: &BackendEnv) -> Result<Vec<PathBuf>, BuildError> {
    let out = entry.out_dir.join(format!("{}.mjs", entry.name));
    let io = |source| BuildError::Io {
      path: out.clone(),
      source,
    };
    let source = tokio::fs::read_to_string(&entry.input).await.map_err(io)?;
    tokio::fs::create_dir_all(&entry.out_dir).await.map_err(io)?;
    tokio::fs::write(&out, format!("/* bundled */\n{}", source)).await.map_err(io)?;
    Ok(vec![out])
  }
}

#[tokio::test]
async fn plugin_bundle_entries_need_a_backend() {
  let project = Project::new();
  project
    .write(
      "twinpack.json",
      r#"{ "entries": [{ "input": "src/index.ts", "builder": "plugin-bundle" }] }"#,
    )
    .write("src/index.ts", "export default 42;\n");

  let err = build(project.root(), false, layers(&project)).await.unwrap_err();
  assert!(matches!(err, BuildError::MissingBackend { .. }));

  let report = Builder::new()
    .with_bundler(Arc::new(Banner))
    .build(project.root(), false, layers(&project))
    .await
    .unwrap();
  assert_eq!(project.read("dist/index.mjs"), "/* bundled */\nexport default 42;\n");
  let main = report.manifest.named().next().unwrap();
  assert_eq!(main.exports, vec!["default"]);
}

#[tokio::test]
async fn stub_build_points_at_sources() {
  let project = Project::new();
  project.write("src/index.ts", "export default function main() {}\n");

  let report = build(project.root(), true, layers(&project)).await.unwrap();
  let stub = project.read("dist/index.mjs");
  assert!(stub.contains(&project.path("src/index.ts").to_string_lossy().replace('\\', "/")));
  assert!(stub.contains("export { default }"));
  assert!(report.registry_manifests.is_empty());
}
