//! Per-registry manifest writers.
//!
//! The builder hands every writer the same [`PackageMetadata`]: common fields,
//! an already filtered dependency map and the entry points of the built
//! package. Each writer renders its registry's manifest file into the output
//! directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::info;

use crate::config::Registry;

use super::PackageError;

/// One exported entry point of a built package, paths relative to the package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
  /// Export subpath: `.` for the main entry, `./name` otherwise.
  pub subpath: String,
  /// Code file, e.g. `./index.mjs`.
  pub import: String,
  /// Declaration file, if one was produced.
  pub types: Option<String>,
}

/// Registry-independent package metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageMetadata {
  pub name: String,
  pub version: String,
  pub license: Option<String>,
  pub description: Option<String>,
  pub dependencies: BTreeMap<String, String>,
  pub peer_dependencies: BTreeMap<String, String>,
  pub entry_points: Vec<EntryPoint>,
}

/// Writes the manifest of one registry.
pub trait ManifestWriter: Send + Sync {
  fn registry(&self) -> Registry;

  /// Manifest file name inside the package directory.
  fn file_name(&self) -> &'static str;

  /// Render the manifest document.
  fn render(&self, meta: &PackageMetadata) -> Value;

  /// Render and write the manifest into `dir`, returning the written path.
  fn write(&self, dir: &Path, meta: &PackageMetadata) -> Result<PathBuf, PackageError> {
    let path = dir.join(self.file_name());
    let content = serde_json::to_string_pretty(&self.render(meta)).map_err(PackageError::Serialize)?;
    fs::create_dir_all(dir).map_err(|source| PackageError::Write {
      path: dir.to_path_buf(),
      source,
    })?;
    fs::write(&path, format!("{}\n", content)).map_err(|source| PackageError::Write {
      path: path.clone(),
      source,
    })?;
    info!(registry = %self.registry(), path = %path.display(), "wrote registry manifest");
    Ok(path)
  }
}

/// `package.json` for npm.
#[derive(Debug, Default, Clone, Copy)]
pub struct NpmManifestWriter;

impl ManifestWriter for NpmManifestWriter {
  fn registry(&self) -> Registry {
    Registry::Npm
  }

  fn file_name(&self) -> &'static str {
    "package.json"
  }

  fn render(&self, meta: &PackageMetadata) -> Value {
    let mut doc = Map::new();
    doc.insert("name".into(), json!(meta.name));
    doc.insert("version".into(), json!(meta.version));
    if let Some(description) = &meta.description {
      doc.insert("description".into(), json!(description));
    }
    if let Some(license) = &meta.license {
      doc.insert("license".into(), json!(license));
    }
    doc.insert("type".into(), json!("module"));

    if let Some(main) = meta.entry_points.iter().find(|e| e.subpath == ".") {
      doc.insert("main".into(), json!(main.import));
      if let Some(types) = &main.types {
        doc.insert("types".into(), json!(types));
      }
    }

    if !meta.entry_points.is_empty() {
      let mut exports = Map::new();
      for entry in &meta.entry_points {
        let mut conditions = Map::new();
        if let Some(types) = &entry.types {
          conditions.insert("types".into(), json!(types));
        }
        conditions.insert("import".into(), json!(entry.import));
        exports.insert(entry.subpath.clone(), Value::Object(conditions));
      }
      doc.insert("exports".into(), Value::Object(exports));
    }

    if !meta.dependencies.is_empty() {
      doc.insert("dependencies".into(), json!(meta.dependencies));
    }
    if !meta.peer_dependencies.is_empty() {
      doc.insert("peerDependencies".into(), json!(meta.peer_dependencies));
    }

    Value::Object(doc)
  }
}

/// `jsr.json` for JSR.
///
/// JSR resolves dependencies from the specifiers in published code, so only
/// identity and the exports map are written.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsrManifestWriter;

impl ManifestWriter for JsrManifestWriter {
  fn registry(&self) -> Registry {
    Registry::Jsr
  }

  fn file_name(&self) -> &'static str {
    "jsr.json"
  }

  fn render(&self, meta: &PackageMetadata) -> Value {
    let mut doc = Map::new();
    doc.insert("name".into(), json!(meta.name));
    doc.insert("version".into(), json!(meta.version));
    if let Some(license) = &meta.license {
      doc.insert("license".into(), json!(license));
    }

    let exports: Map<String, Value> = meta
      .entry_points
      .iter()
      .map(|entry| (entry.subpath.clone(), json!(entry.import)))
      .collect();
    doc.insert("exports".into(), Value::Object(exports));

    Value::Object(doc)
  }
}

/// The writer for `registry`.
pub fn writer_for(registry: Registry) -> Box<dyn ManifestWriter> {
  match registry {
    Registry::Npm => Box::new(NpmManifestWriter),
    Registry::Jsr => Box::new(JsrManifestWriter),
  }
}
