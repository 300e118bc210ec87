//! Builder backends.
//!
//! Each entry is dispatched to one backend by its [`BuilderKind`]. Backends
//! are independent of each other, so the orchestrator may run them
//! concurrently. A backend returns the manifest records of what it wrote
//! plus any recoverable per-file errors; a backend error aborts the build.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::BuilderKind;
use crate::consts::IGNORED_DIRS;
use crate::link::paths::resolve_local;
use crate::scan::find_exports;
use crate::transform::declarations::DeclarationExtractor;
use crate::transform::loader::Loader;
use crate::transform::types::full_extension;
use crate::transform::{FileError, TransformOptions, WrittenFile, transform};

use super::stub::stub_entry;
use super::types::{BuildEntry, BuildError, BuildOptions, ManifestEntry, display_path};

/// Extensions whose exports are recorded in the manifest.
const CODE_EXTENSIONS: &[&str] = &[".mjs", ".js", ".cjs"];

/// External bundler used by [`BuilderKind::PluginBundle`] entries.
#[async_trait]
pub trait BundleBackend: Send + Sync {
  fn name(&self) -> &str;

  /// Bundle `entry` into its output directory and return the written files,
  /// main output first.
  async fn bundle(&self, entry: &BuildEntry, env: &BackendEnv) -> Result<Vec<PathBuf>, BuildError>;
}

/// Everything a backend may read, shared by all backend tasks of one build.
pub struct BackendEnv {
  pub options: BuildOptions,
  pub externals: BTreeSet<String>,
  pub loaders: Vec<Arc<dyn Loader>>,
  pub extractor: Arc<dyn DeclarationExtractor>,
  pub bundler: Option<Arc<dyn BundleBackend>>,
}

/// What one backend produced.
#[derive(Debug, Default)]
pub struct BackendOutput {
  pub records: Vec<ManifestEntry>,
  pub errors: Vec<FileError>,
}

/// Build one entry with the backend its builder kind selects.
pub async fn run_entry(entry: &BuildEntry, env: &BackendEnv) -> Result<BackendOutput, BuildError> {
  info!(entry = %entry.name, builder = %entry.builder, "building entry");

  if env.options.stub {
    return match entry.builder {
      BuilderKind::Transform | BuilderKind::Mirror | BuilderKind::PluginBundle => stub_entry(entry, env).await,
      BuilderKind::Copy => copy_entry(entry, env).await,
      BuilderKind::SpecGenerate => Ok(BackendOutput::default()),
    };
  }

  match entry.builder {
    BuilderKind::Transform | BuilderKind::Mirror => transform_entry(entry, env, false).await,
    BuilderKind::SpecGenerate => transform_entry(entry, env, true).await,
    BuilderKind::Copy => copy_entry(entry, env).await,
    BuilderKind::PluginBundle => bundle_entry(entry, env).await,
  }
}

/// Resolve an entry's input, checking the shape its builder needs. A
/// single-file input may omit its extension.
pub(crate) fn resolve_input(entry: &BuildEntry) -> Result<PathBuf, BuildError> {
  let input = &entry.input;
  match entry.builder {
    BuilderKind::Mirror | BuilderKind::SpecGenerate if input.is_file() => Err(BuildError::NotADirectory {
      entry: entry.name.clone(),
      builder: entry.builder,
      path: input.clone(),
    }),
    _ if input.exists() => Ok(input.clone()),
    BuilderKind::Transform | BuilderKind::PluginBundle => {
      resolve_local(input, false).ok_or_else(|| BuildError::InputNotFound {
        entry: entry.name.clone(),
        path: input.clone(),
      })
    }
    _ => Err(BuildError::InputNotFound {
      entry: entry.name.clone(),
      path: input.clone(),
    }),
  }
}

/// A manifest record for a file on disk.
pub(crate) fn record(root: &Path, path: &Path, bytes: u64, chunk: bool, content: Option<&str>) -> ManifestEntry {
  let exports = match content {
    Some(text) if CODE_EXTENSIONS.contains(&full_extension(&path.to_string_lossy())) => find_exports(text),
    _ => Vec::new(),
  };
  ManifestEntry {
    path: display_path(root, path),
    bytes,
    chunk,
    chunks: Vec::new(),
    exports,
  }
}

/// Named entries of a transform: a single-file entry's code output, or a
/// directory's top-level `index` module.
fn is_named(entry: &BuildEntry, written: &WrittenFile) -> bool {
  if written.declaration || written.raw {
    return false;
  }
  match entry.builder {
    BuilderKind::Transform => true,
    BuilderKind::Mirror => {
      let ext = full_extension(&written.rel_path);
      &written.rel_path[..written.rel_path.len() - ext.len()] == "index"
    }
    _ => false,
  }
}

async fn transform_entry(entry: &BuildEntry, env: &BackendEnv, only_declarations: bool) -> Result<BackendOutput, BuildError> {
  let src = resolve_input(entry)?;
  let config = &env.options.transform;

  let options = TransformOptions {
    root_dir: env.options.root_dir.clone(),
    src_dir: src,
    dist_dir: entry.out_dir.clone(),
    pattern: config.pattern.clone(),
    exclude: config.exclude.clone(),
    declaration: entry.declaration || only_declarations,
    only_declarations,
    loaders: env.loaders.clone(),
    // output directories were cleaned once, up front
    clean: false,
    format: config.format,
    esm_extension: config.esm_extension.clone(),
    declaration_extension: config.declaration_extension.clone(),
    concurrency: config.concurrency,
    extractor: env.extractor.clone(),
  };

  let result = transform(&options).await.map_err(|source| BuildError::Transform {
    entry: entry.name.clone(),
    source,
  })?;

  let root = &env.options.root_dir;
  let records = result
    .written
    .iter()
    .map(|w| ManifestEntry {
      path: display_path(root, &w.path),
      bytes: w.bytes,
      chunk: !is_named(entry, w),
      chunks: w
        .chunks
        .iter()
        .map(|c| display_path(root, &entry.out_dir.join(c)))
        .collect(),
      exports: w.exports.clone(),
    })
    .collect();

  Ok(BackendOutput {
    records,
    errors: result.errors,
  })
}

/// Copy a file, or a directory tree preserving its layout, into the entry's
/// output directory.
async fn copy_entry(entry: &BuildEntry, env: &BackendEnv) -> Result<BackendOutput, BuildError> {
  let src = resolve_input(entry)?;

  let pairs: Vec<(PathBuf, PathBuf)> = if src.is_file() {
    let name = src.file_name().map(PathBuf::from).unwrap_or_default();
    vec![(src.clone(), entry.out_dir.join(name))]
  } else {
    let walker = WalkDir::new(&src).sort_by_file_name().into_iter().filter_entry(|e| {
      e.depth() == 0
        || e
          .file_name()
          .to_str()
          .map(|name| !IGNORED_DIRS.contains(&name))
          .unwrap_or(true)
    });
    let mut pairs = Vec::new();
    for item in walker {
      let item = item.map_err(|e| BuildError::Io {
        path: src.clone(),
        source: e.into(),
      })?;
      if item.file_type().is_file() {
        let rel = item.path().strip_prefix(&src).unwrap_or(item.path());
        pairs.push((item.path().to_path_buf(), entry.out_dir.join(rel)));
      }
    }
    pairs
  };

  let mut output = BackendOutput::default();
  for (from, to) in pairs {
    if let Some(parent) = to.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(BuildError::io(parent))?;
    }
    let bytes = tokio::fs::copy(&from, &to).await.map_err(BuildError::io(&from))?;
    debug!(from = %from.display(), to = %to.display(), bytes, "copied");
    output.records.push(record(&env.options.root_dir, &to, bytes, true, None));
  }
  Ok(output)
}

async fn bundle_entry(entry: &BuildEntry, env: &BackendEnv) -> Result<BackendOutput, BuildError> {
  let bundler = env.bundler.as_ref().ok_or_else(|| BuildError::MissingBackend {
    entry: entry.name.clone(),
  })?;
  resolve_input(entry)?;
  debug!(entry = %entry.name, backend = bundler.name(), "bundling");

  let files = bundler.bundle(entry, env).await?;
  let mut output = BackendOutput::default();
  for (idx, path) in files.iter().enumerate() {
    let meta = tokio::fs::metadata(path).await.map_err(BuildError::io(path))?;
    let content = tokio::fs::read_to_string(path).await.ok();
    output
      .records
      .push(record(&env.options.root_dir, path, meta.len(), idx > 0, content.as_deref()));
  }
  Ok(output)
}
