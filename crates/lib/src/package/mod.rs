//! Package metadata of the consuming package.
//!
//! Only the fields the builder needs are typed; everything else in
//! `package.json` is preserved in [`PackageJson::other`].

pub mod manifest;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use manifest::{EntryPoint, JsrManifestWriter, ManifestWriter, NpmManifestWriter, PackageMetadata, writer_for};

/// Errors reading or writing package manifests.
#[derive(Debug, Error)]
pub enum PackageError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize manifest: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// The subset of `package.json` the builder reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub dependencies: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub peer_dependencies: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub dev_dependencies: BTreeMap<String, String>,
  #[serde(flatten)]
  pub other: serde_json::Map<String, serde_json::Value>,
}

impl PackageJson {
  /// Load `package.json` from `dir`.
  ///
  /// A missing file yields an empty package (no name, no dependencies).
  pub fn load(dir: &Path) -> Result<Self, PackageError> {
    let path = dir.join(crate::consts::PACKAGE_JSON);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => return Err(PackageError::Read { path, source }),
    };
    serde_json::from_str(&content).map_err(|source| PackageError::Parse { path, source })
  }

  /// Names of runtime and peer dependencies: what consumers install with the package.
  pub fn runtime_dependency_names(&self) -> BTreeSet<String> {
    self
      .dependencies
      .keys()
      .chain(self.peer_dependencies.keys())
      .cloned()
      .collect()
  }

  /// Names of every declared dependency, including dev dependencies.
  pub fn all_dependency_names(&self) -> BTreeSet<String> {
    self
      .runtime_dependency_names()
      .into_iter()
      .chain(self.dev_dependencies.keys().cloned())
      .collect()
  }
}
