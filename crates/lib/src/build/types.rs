use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::{BuilderKind, ConfigError, Registry, TransformConfig};
use crate::link::{LibraryDescriptor, LinkError};
use crate::package::PackageError;
use crate::transform::{FileError, TransformError};

use super::hooks::HookStage;

/// One normalized unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEntry {
  pub builder: BuilderKind,
  pub input: PathBuf,
  pub out_dir: PathBuf,
  pub name: String,
  pub declaration: bool,
  pub is_lib: bool,
}

/// Global settings of one build invocation, resolved to absolute paths.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
  pub root_dir: PathBuf,
  pub out_dir: PathBuf,
  pub entries: Vec<BuildEntry>,
  pub externals: Vec<String>,
  pub clean: bool,
  pub parallel: bool,
  pub fail_on_warn: bool,
  pub stub: bool,
  pub declaration: bool,
  pub transform: TransformConfig,
  pub libraries: Vec<LibraryDescriptor>,
  pub alias_prefix: String,
  pub side_dir: String,
  pub registries: Vec<Registry>,
}

/// One produced file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
  /// Path relative to the project root, `/`-separated.
  pub path: String,
  pub bytes: u64,
  /// Anonymous chunk rather than a named entry.
  pub chunk: bool,
  /// Other produced files this one imports.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub chunks: Vec<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub exports: Vec<String>,
}

/// Every file a build produced, in production order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildManifest {
  pub entries: Vec<ManifestEntry>,
}

impl BuildManifest {
  pub fn contains(&self, path: &str) -> bool {
    self.entries.iter().any(|e| e.path == path)
  }

  /// Add `entry` unless a record for its path exists.
  pub fn push(&mut self, entry: ManifestEntry) {
    if !self.contains(&entry.path) {
      self.entries.push(entry);
    }
  }

  pub fn total_bytes(&self) -> u64 {
    self.entries.iter().map(|e| e.bytes).sum()
  }

  /// Named entries, i.e. records that are not chunks.
  pub fn named(&self) -> impl Iterator<Item = &ManifestEntry> {
    self.entries.iter().filter(|e| !e.chunk)
  }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
  pub manifest: BuildManifest,
  pub warnings: Vec<String>,
  /// Recoverable per-file errors (declarations, writes).
  pub errors: Vec<FileError>,
  /// Files the linker rewrote.
  pub linked: Vec<PathBuf>,
  /// Registry manifests written into the output directory.
  pub registry_manifests: Vec<PathBuf>,
  pub duration: Duration,
}

/// `path` relative to `root` with `/` separators.
pub fn display_path(root: &Path, path: &Path) -> String {
  path
    .strip_prefix(root)
    .unwrap_or(path)
    .to_string_lossy()
    .replace('\\', "/")
}

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error("entry #{index} has no input")]
  MissingInput { index: usize },

  #[error("entry {entry}: input {path} does not exist")]
  InputNotFound { entry: String, path: PathBuf },

  #[error("entry {entry}: {path} is a file, but the {builder} builder requires a directory")]
  NotADirectory {
    entry: String,
    builder: BuilderKind,
    path: PathBuf,
  },

  #[error("entry {entry}: no bundle backend registered")]
  MissingBackend { entry: String },

  #[error("entry {entry}: {source}")]
  Transform {
    entry: String,
    #[source]
    source: TransformError,
  },

  #[error("entries {first} and {second} both write {path}")]
  OutputConflict { path: String, first: String, second: String },

  #[error("entry {entry}: bundle backend failed: {message}")]
  Backend { entry: String, message: String },

  #[error(transparent)]
  Link(#[from] LinkError),

  #[error("{stage} hook failed: {message}")]
  Hook { stage: HookStage, message: String },

  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("build failed with {count} warning(s):\n{list}")]
  Warnings { count: usize, list: String },

  #[error("build task failed: {message}")]
  Task { message: String },
}

impl BuildError {
  pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  /// Fail-on-warn error listing every warning on its own line.
  pub fn warnings(warnings: &[String]) -> Self {
    BuildError::Warnings {
      count: warnings.len(),
      list: warnings.iter().map(|w| format!("  - {}", w)).collect::<Vec<_>>().join("\n"),
    }
  }
}
