//! Source-to-output transformation.
//!
//! Drives the loader pipeline over a source tree and writes the results,
//! mirroring the source layout. The pipeline is two-phase: every output is
//! computed in memory, normalized and checked for path conflicts, and only
//! then written.
//!
//! 1. Clean the output directory (unless disabled)
//! 2. Discover inputs
//! 3. Load each input through the loader chain (bounded concurrency)
//! 4. Normalize extensions and reject path conflicts
//! 5. Generate declarations in one batch
//! 6. Resolve extensionless relative specifiers against the output set
//! 7. Write (bounded concurrency, per-file errors collected)

pub mod declarations;
pub mod discover;
pub mod loader;
pub mod resolve;
pub mod types;
mod write;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::ModuleFormat;
use crate::consts::{DEFAULT_FILE_CONCURRENCY, DEFAULT_PATTERN};
use crate::scan::find_exports;

use declarations::{DeclarationExtractor, ExtractOptions, UnavailableExtractor, generate_declarations};
use loader::{LoadError, Loader, LoaderOptions, default_loaders, run_loaders};
use types::{InputFile, OutputFile};

pub use write::write_outputs;

/// Errors that abort a transform.
#[derive(Debug, Error)]
pub enum TransformError {
  #[error("invalid glob pattern {pattern:?}: {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: glob::PatternError,
  },

  #[error("failed to walk source directory: {message}")]
  Walk { message: String },

  #[error("failed to load {path}: {source}")]
  Load {
    path: PathBuf,
    #[source]
    source: LoadError,
  },

  /// Two sources normalize to the same output path.
  #[error("output path conflict: {first} and {second} both produce {path}")]
  PathConflict {
    path: String,
    first: PathBuf,
    second: PathBuf,
  },

  #[error("refusing to clean {dist}: it contains the source directory {src}")]
  UnsafeClean { dist: PathBuf, src: PathBuf },

  #[error("failed to clean {path}: {source}")]
  Clean {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("transform task failed: {message}")]
  Task { message: String },
}

/// A recoverable failure attached to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
  pub path: PathBuf,
  pub message: String,
}

impl std::fmt::Display for FileError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.path.display(), self.message)
  }
}

/// Options of one transform run.
#[derive(Clone)]
pub struct TransformOptions {
  pub root_dir: PathBuf,
  /// Source directory, or a single source file.
  pub src_dir: PathBuf,
  pub dist_dir: PathBuf,
  pub pattern: String,
  pub exclude: Vec<String>,
  pub declaration: bool,
  /// Emit declarations only, no code and no raw copies.
  pub only_declarations: bool,
  pub loaders: Vec<Arc<dyn Loader>>,
  pub clean: bool,
  pub format: ModuleFormat,
  pub esm_extension: String,
  pub declaration_extension: String,
  pub concurrency: usize,
  pub extractor: Arc<dyn DeclarationExtractor>,
}

impl TransformOptions {
  /// Options with the built-in loaders and defaults for everything else.
  pub fn new(src_dir: impl Into<PathBuf>, dist_dir: impl Into<PathBuf>) -> Self {
    let src_dir = src_dir.into();
    Self {
      root_dir: src_dir.parent().map(Path::to_path_buf).unwrap_or_default(),
      src_dir,
      dist_dir: dist_dir.into(),
      pattern: DEFAULT_PATTERN.to_string(),
      exclude: Vec::new(),
      declaration: false,
      only_declarations: false,
      loaders: default_loaders(),
      clean: true,
      format: ModuleFormat::Esm,
      esm_extension: ".mjs".to_string(),
      declaration_extension: ".d.mts".to_string(),
      concurrency: DEFAULT_FILE_CONCURRENCY,
      extractor: Arc::new(UnavailableExtractor),
    }
  }

  fn loader_options(&self) -> LoaderOptions {
    LoaderOptions {
      format: self.format,
      esm_extension: self.esm_extension.clone(),
      declaration_extension: self.declaration_extension.clone(),
      declaration: self.declaration || self.only_declarations,
      emit_code: !self.only_declarations,
    }
  }
}

/// A file the transform wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenFile {
  /// Path relative to the output directory.
  pub rel_path: String,
  pub path: PathBuf,
  pub bytes: u64,
  pub declaration: bool,
  pub raw: bool,
  /// Exported symbols of code outputs.
  pub exports: Vec<String>,
  /// Other outputs this file imports, relative to the output directory.
  pub chunks: Vec<String>,
}

/// Outcome of a transform: what was written and what failed per file.
#[derive(Debug, Default)]
pub struct TransformResult {
  pub written: Vec<WrittenFile>,
  pub errors: Vec<FileError>,
}

impl TransformResult {
  pub fn written_paths(&self) -> Vec<&Path> {
    self.written.iter().map(|w| w.path.as_path()).collect()
  }
}

/// Run the transform pipeline.
pub async fn transform(options: &TransformOptions) -> Result<TransformResult, TransformError> {
  info!(
    src = %options.src_dir.display(),
    dist = %options.dist_dir.display(),
    declaration = options.declaration,
    "transforming"
  );

  if options.clean {
    clean_dist(&options.src_dir, &options.dist_dir).await?;
  }

  let src = options.src_dir.clone();
  let pattern = options.pattern.clone();
  let exclude = options.exclude.clone();
  let inputs = tokio::task::spawn_blocking(move || discover::discover(&src, &pattern, &exclude))
    .await
    .map_err(|e| TransformError::Task { message: e.to_string() })??;
  debug!(inputs = inputs.len(), "discovered inputs");

  let mut outputs = load_all(inputs, options).await?;

  resolve::normalize_and_check(&mut outputs)?;

  let extract_options = ExtractOptions {
    root_dir: options.root_dir.clone(),
    src_dir: options.src_dir.clone(),
    declaration_extension: options.declaration_extension.clone(),
  };
  generate_declarations(&mut outputs, options.extractor.as_ref(), &extract_options).await;

  let index = resolve::output_index(&outputs);
  resolve::resolve_specifiers(&mut outputs, &index);

  let mut errors: Vec<FileError> = outputs
    .iter()
    .flat_map(|o| {
      o.errors.iter().map(|message| FileError {
        path: o.src_path.clone(),
        message: message.clone(),
      })
    })
    .collect();

  let (written, write_errors) = write_outputs(&outputs, &options.dist_dir, options.concurrency).await;
  errors.extend(write_errors);

  let written: Vec<WrittenFile> = written
    .into_iter()
    .map(|(idx, path, bytes)| {
      let output = &outputs[idx];
      let code = !output.raw && !output.declaration;
      let contents = output.contents.as_deref().unwrap_or("");
      WrittenFile {
        rel_path: output.rel_path().to_string(),
        path,
        bytes,
        declaration: output.declaration,
        raw: output.raw,
        exports: if code { find_exports(contents) } else { Vec::new() },
        chunks: if code {
          resolve::imported_outputs(output.rel_path(), contents, &index)
        } else {
          Vec::new()
        },
      }
    })
    .collect();

  info!(
    written = written.len(),
    errors = errors.len(),
    dist = %options.dist_dir.display(),
    "transform complete"
  );

  Ok(TransformResult { written, errors })
}

async fn clean_dist(src: &Path, dist: &Path) -> Result<(), TransformError> {
  if !dist.exists() {
    return Ok(());
  }
  if src.starts_with(dist) {
    return Err(TransformError::UnsafeClean {
      dist: dist.to_path_buf(),
      src: src.to_path_buf(),
    });
  }
  debug!(path = %dist.display(), "cleaning output directory");
  tokio::fs::remove_dir_all(dist)
    .await
    .map_err(|source| TransformError::Clean {
      path: dist.to_path_buf(),
      source,
    })
}

/// Run the loader chain over every input with bounded concurrency, keeping
/// outputs in input order.
async fn load_all(inputs: Vec<InputFile>, options: &TransformOptions) -> Result<Vec<OutputFile>, TransformError> {
  let loaders = Arc::new(options.loaders.clone());
  let loader_options = Arc::new(options.loader_options());
  let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
  let mut join_set = JoinSet::new();

  for (idx, input) in inputs.into_iter().enumerate() {
    let loaders = loaders.clone();
    let loader_options = loader_options.clone();
    let semaphore = semaphore.clone();

    join_set.spawn(async move {
      let _permit = semaphore.acquire_owned().await;
      let claimed = run_loaders(&loaders, &input, &loader_options).await;
      let outputs = match claimed {
        Ok(Some(outputs)) => Ok(outputs),
        Ok(None) if loader_options.emit_code => Ok(vec![OutputFile::raw(&input)]),
        Ok(None) => Ok(Vec::new()),
        Err(source) => Err(TransformError::Load {
          path: input.abs_path.clone(),
          source,
        }),
      };
      (idx, outputs)
    });
  }

  let mut loaded = Vec::new();
  while let Some(joined) = join_set.join_next().await {
    let (idx, outputs) = joined.map_err(|e| TransformError::Task { message: e.to_string() })?;
    loaded.push((idx, outputs?));
  }

  loaded.sort_by_key(|(idx, _)| *idx);
  Ok(loaded.into_iter().flat_map(|(_, outputs)| outputs).collect())
}

#[cfg(test)]
mod tests {
  use std::collections::{BTreeMap, HashMap};
  use std::fs;

  use async_trait::async_trait;
  use tempfile::tempdir;

  use super::declarations::DeclarationOutput;
  use super::*;

  fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  struct StubExtractor;

  #[async_trait]
  impl DeclarationExtractor for StubExtractor {
    async fn extract(
      &self,
      files: &BTreeMap<PathBuf, String>,
      _options: &ExtractOptions,
    ) -> HashMap<PathBuf, DeclarationOutput> {
      files
        .keys()
        .map(|p| {
          (
            p.clone(),
            DeclarationOutput {
              contents: Some("export declare const x: number;\n".to_string()),
              errors: vec![],
            },
          )
        })
        .collect()
    }
  }

  #[tokio::test]
  async fn mirrors_tree_and_resolves_specifiers() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    let dist = temp.path().join("dist");
    write(&src, "index.ts", "export { add } from './utils/helper';\n");
    write(&src, "utils/helper.ts", "export const add = (a: number, b: number) => a + b;\n");
    write(&src, "assets/data.json", "{}");

    let options = TransformOptions::new(&src, &dist);
    let result = transform(&options).await.unwrap();

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(
      fs::read_to_string(dist.join("index.mjs")).unwrap(),
      "export { add } from './utils/helper.mjs';\n"
    );
    assert!(dist.join("utils/helper.mjs").exists());
    assert!(dist.join("assets/data.json").exists());

    let index = result.written.iter().find(|w| w.rel_path == "index.mjs").unwrap();
    assert_eq!(index.exports, vec!["add"]);
    assert_eq!(index.chunks, vec!["utils/helper.mjs"]);
  }

  #[tokio::test]
  async fn conflict_fails_before_any_write() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    let dist = temp.path().join("dist");
    write(&src, "a.ts", "export const a = 1;\n");
    write(&src, "a.tsx", "export const a = <div />;\n");
    write(&src, "b.ts", "export const b = 2;\n");

    let mut options = TransformOptions::new(&src, &dist);
    options.esm_extension = ".js".to_string();
    let err = transform(&options).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("a.ts "), "{}", message);
    assert!(message.contains("a.tsx"), "{}", message);
    assert!(!dist.exists() || fs::read_dir(&dist).unwrap().next().is_none());
  }

  #[tokio::test]
  async fn declarations_are_written_next_to_code() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    let dist = temp.path().join("dist");
    write(&src, "index.ts", "export const x = 1;\n");

    let mut options = TransformOptions::new(&src, &dist);
    options.declaration = true;
    options.extractor = Arc::new(StubExtractor);
    let result = transform(&options).await.unwrap();

    assert!(result.errors.is_empty());
    assert_eq!(
      fs::read_to_string(dist.join("index.d.mts")).unwrap(),
      "export declare const x: number;\n"
    );
    assert!(result.written.iter().any(|w| w.declaration && w.rel_path == "index.d.mts"));
  }

  #[tokio::test]
  async fn declaration_failures_are_per_file() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    let dist = temp.path().join("dist");
    write(&src, "index.ts", "export const x = 1;\n");

    let mut options = TransformOptions::new(&src, &dist);
    options.declaration = true;
    let result = transform(&options).await.unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(dist.join("index.mjs").exists());
    assert!(!dist.join("index.d.mts").exists());
  }

  #[tokio::test]
  async fn only_declarations_skips_code_and_raw_files() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    let dist = temp.path().join("dist");
    write(&src, "index.ts", "export const x = 1;\n");
    write(&src, "logo.svg", "<svg/>");

    let mut options = TransformOptions::new(&src, &dist);
    options.only_declarations = true;
    options.extractor = Arc::new(StubExtractor);
    let result = transform(&options).await.unwrap();

    assert_eq!(result.written.len(), 1);
    assert!(dist.join("index.d.mts").exists());
    assert!(!dist.join("index.mjs").exists());
    assert!(!dist.join("logo.svg").exists());
  }

  #[tokio::test]
  async fn clean_removes_stale_outputs_unless_disabled() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    let dist = temp.path().join("dist");
    write(&src, "index.js", "export {};\n");
    write(&dist, "stale.mjs", "old");

    let mut options = TransformOptions::new(&src, &dist);
    options.clean = false;
    transform(&options).await.unwrap();
    assert!(dist.join("stale.mjs").exists());

    options.clean = true;
    transform(&options).await.unwrap();
    assert!(!dist.join("stale.mjs").exists());
    assert!(dist.join("index.mjs").exists());
  }

  #[tokio::test]
  async fn refuses_to_clean_a_parent_of_the_sources() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    write(&src, "index.js", "export {};\n");

    let options = TransformOptions::new(&src, temp.path());
    let err = transform(&options).await.unwrap_err();
    assert!(matches!(err, TransformError::UnsafeClean { .. }));
    assert!(src.join("index.js").exists());
  }
}
