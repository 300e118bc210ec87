//! Build orchestration.
//!
//! One invocation turns the merged configuration into output trees:
//!
//! 1. Resolve configuration layers and normalize entries
//! 2. Infer externals from built-ins, configuration and `package.json`
//! 3. Clean output directories (never the root or its ancestors)
//! 4. Dispatch entries to backends, sequentially or concurrently
//! 5. Link library trees of a multi-package build
//! 6. Complete the manifest with every file on disk
//! 7. Validate dependencies; with `failOnWarn`, any warning fails the build
//! 8. Write registry manifests
//!
//! Backend failures abort the invocation. Output already on disk is left in
//! place for inspection.
//!
//! # Submodules
//!
//! - [`backends`] - Builder backends and the bundle backend trait
//! - [`hooks`] - Lifecycle hook registry
//! - [`validate`] - Dependency validation

pub mod backends;
mod clean;
mod context;
mod entry;
mod externals;
pub mod hooks;
mod stub;
mod types;
pub mod validate;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{error, info};
use walkdir::WalkDir;

use crate::config::ConfigLayers;
use crate::link::{LinkOptions, link};
use crate::package::{EntryPoint, PackageJson, PackageMetadata, writer_for};
use crate::transform::declarations::{DeclarationExtractor, UnavailableExtractor};
use crate::transform::loader::{Loader, default_loaders};
use crate::transform::types::full_extension;

pub use backends::{BackendEnv, BackendOutput, BundleBackend};
pub use clean::clean_targets;
pub use context::BuildContext;
pub use entry::{infer_name, normalize_entry};
pub use externals::infer_externals;
pub use hooks::{HookRegistry, HookStage};
pub use stub::stub_contents;
pub use types::*;
pub use validate::DependencyUsage;

/// Extensions a registry entry point may have.
const ENTRY_EXTENSIONS: &[&str] = &[".mjs", ".js", ".cjs"];

/// Declaration extensions looked up next to an entry point.
const TYPES_EXTENSIONS: &[&str] = &[".d.mts", ".d.ts", ".d.cts"];

/// The build orchestrator with its pluggable collaborators.
pub struct Builder {
  loaders: Vec<Arc<dyn Loader>>,
  extractor: Arc<dyn DeclarationExtractor>,
  bundler: Option<Arc<dyn BundleBackend>>,
  hooks: HookRegistry,
}

impl Default for Builder {
  fn default() -> Self {
    Self {
      loaders: default_loaders(),
      extractor: Arc::new(UnavailableExtractor),
      bundler: None,
      hooks: HookRegistry::default(),
    }
  }
}

impl Builder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Replace the loader pipeline.
  pub fn with_loaders(mut self, loaders: Vec<Arc<dyn Loader>>) -> Self {
    self.loaders = loaders;
    self
  }

  pub fn with_extractor(mut self, extractor: Arc<dyn DeclarationExtractor>) -> Self {
    self.extractor = extractor;
    self
  }

  pub fn with_bundler(mut self, bundler: Arc<dyn BundleBackend>) -> Self {
    self.bundler = Some(bundler);
    self
  }

  pub fn hook<F>(mut self, stage: HookStage, hook: F) -> Self
  where
    F: Fn(&mut BuildContext) -> Result<(), BuildError> + Send + Sync + 'static,
  {
    self.hooks.register(stage, hook);
    self
  }

  /// Run one build of the project at `root`.
  pub async fn build(&self, root: &Path, stub: bool, layers: ConfigLayers) -> Result<BuildReport, BuildError> {
    let started = Instant::now();

    let config = layers.resolve();
    let options = BuildOptions::from_config(root, stub, &config)?;
    let package = PackageJson::load(&options.root_dir)?;
    let mut ctx = BuildContext::new(options, package);
    info!(
      root = %ctx.options.root_dir.display(),
      entries = ctx.options.entries.len(),
      stub,
      "starting build"
    );
    self.hooks.run(HookStage::ConfigResolved, &mut ctx)?;

    ctx.externals = infer_externals(&ctx.options.externals, &ctx.package);
    self.hooks.run(HookStage::EntriesResolved, &mut ctx)?;

    if ctx.options.clean {
      let targets = clean_targets(
        &ctx.options.root_dir,
        ctx.options.entries.iter().map(|e| e.out_dir.as_path()),
      );
      clean::clean_dirs(&targets).await?;
    }

    self.hooks.run(HookStage::BackendsBefore, &mut ctx)?;
    let env = Arc::new(BackendEnv {
      options: ctx.options.clone(),
      externals: ctx.externals.clone(),
      loaders: self.loaders.clone(),
      extractor: self.extractor.clone(),
      bundler: self.bundler.clone(),
    });
    let outputs = match dispatch(&env).await {
      Ok(outputs) => outputs,
      Err(e) => {
        error!(error = %e, warnings = ctx.warnings().len(), "build failed");
        return Err(e);
      }
    };
    if let Err(e) = merge_outputs(&mut ctx, outputs) {
      error!(error = %e, "build failed");
      return Err(e);
    }
    self.hooks.run(HookStage::BackendsDone, &mut ctx)?;

    let mut linked = Vec::new();
    let mut usage = DependencyUsage::default();
    if !stub {
      if !ctx.options.libraries.is_empty() {
        linked = link_libraries(&mut ctx).await?;
      }
      synthesize_manifest(&mut ctx)?;
    }
    self.hooks.run(HookStage::ManifestReady, &mut ctx)?;

    if !stub {
      usage = validate::validate_dependencies(&mut ctx);
    }
    for file_error in &ctx.errors {
      error!(path = %file_error.path.display(), error = %file_error.message, "file failed");
    }

    if ctx.options.fail_on_warn && !ctx.warnings().is_empty() {
      let err = BuildError::warnings(ctx.warnings());
      error!(warnings = ctx.warnings().len(), "build failed: warnings are errors");
      return Err(err);
    }

    let mut registry_manifests = Vec::new();
    if !stub {
      let metadata = package_metadata(&ctx, &usage);
      for registry in &ctx.options.registries {
        registry_manifests.push(writer_for(*registry).write(&ctx.options.out_dir, &metadata)?);
      }
    }

    self.hooks.run(HookStage::BuildDone, &mut ctx)?;

    let duration = started.elapsed();
    info!(
      files = ctx.manifest.entries.len(),
      bytes = ctx.manifest.total_bytes(),
      warnings = ctx.warnings().len(),
      duration_ms = duration.as_millis() as u64,
      "build complete"
    );

    Ok(BuildReport {
      warnings: ctx.warnings().to_vec(),
      manifest: ctx.manifest,
      errors: ctx.errors,
      linked,
      registry_manifests,
      duration,
    })
  }
}

/// Build with the default collaborators.
pub async fn build(root: &Path, stub: bool, layers: ConfigLayers) -> Result<BuildReport, BuildError> {
  Builder::default().build(root, stub, layers).await
}

/// Run every entry's backend. In parallel mode the first failure aborts the
/// remaining tasks.
async fn dispatch(env: &Arc<BackendEnv>) -> Result<Vec<BackendOutput>, BuildError> {
  let entries = env.options.entries.clone();

  if !env.options.parallel {
    let mut outputs = Vec::with_capacity(entries.len());
    for entry in &entries {
      outputs.push(backends::run_entry(entry, env).await?);
    }
    return Ok(outputs);
  }

  let mut join_set = JoinSet::new();
  for (idx, entry) in entries.into_iter().enumerate() {
    let env = env.clone();
    join_set.spawn(async move { (idx, backends::run_entry(&entry, &env).await) });
  }

  let mut outputs = Vec::new();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((idx, Ok(output))) => outputs.push((idx, output)),
      Ok((_, Err(e))) => {
        join_set.abort_all();
        return Err(e);
      }
      Err(e) => {
        join_set.abort_all();
        return Err(BuildError::Task { message: e.to_string() });
      }
    }
  }

  outputs.sort_by_key(|(idx, _)| *idx);
  Ok(outputs.into_iter().map(|(_, output)| output).collect())
}

/// Fold backend outputs into the manifest. A path two entries both wrote is
/// fatal: the file on disk holds only one of them.
fn merge_outputs(ctx: &mut BuildContext, outputs: Vec<BackendOutput>) -> Result<(), BuildError> {
  let mut owners: HashMap<String, usize> = HashMap::new();
  for (idx, output) in outputs.into_iter().enumerate() {
    for record in output.records {
      if let Some(&first) = owners.get(&record.path)
        && first != idx
      {
        let label = |i: usize| display_path(&ctx.options.root_dir, &ctx.options.entries[i].input);
        return Err(BuildError::OutputConflict {
          path: record.path,
          first: label(first),
          second: label(idx),
        });
      }
      owners.insert(record.path.clone(), idx);
      ctx.manifest.push(record);
    }
    ctx.errors.extend(output.errors);
  }
  Ok(())
}

async fn link_libraries(ctx: &mut BuildContext) -> Result<Vec<PathBuf>, BuildError> {
  let options = LinkOptions {
    root_dir: ctx.options.root_dir.clone(),
    alias_prefix: ctx.options.alias_prefix.clone(),
    libraries: ctx.options.libraries.clone(),
    side_dir: ctx.options.side_dir.clone(),
  };
  let result = tokio::task::spawn_blocking(move || link(&options))
    .await
    .map_err(|e| BuildError::Task { message: e.to_string() })??;

  for warning in result.warnings {
    ctx.warn(warning);
  }
  Ok(result.modified)
}

/// Record every on-disk file under the output directories that no backend
/// reported, as an anonymous chunk.
fn synthesize_manifest(ctx: &mut BuildContext) -> Result<(), BuildError> {
  let dirs: BTreeSet<PathBuf> = ctx
    .options
    .entries
    .iter()
    .map(|e| e.out_dir.clone())
    .chain(ctx.options.libraries.iter().map(|l| l.out_dir.clone()))
    .collect();

  for dir in dirs.iter().filter(|d| d.is_dir()) {
    for item in WalkDir::new(dir).sort_by_file_name() {
      let item = item.map_err(|e| BuildError::Io {
        path: dir.clone(),
        source: e.into(),
      })?;
      if !item.file_type().is_file() {
        continue;
      }
      let path = display_path(&ctx.options.root_dir, item.path());
      if ctx.manifest.contains(&path) {
        continue;
      }
      let bytes = item.metadata().map(|m| m.len()).unwrap_or(0);
      ctx.manifest.push(ManifestEntry {
        path,
        bytes,
        chunk: true,
        chunks: Vec::new(),
        exports: Vec::new(),
      });
    }
  }
  Ok(())
}

/// Registry-independent metadata: identity from `package.json`, dependencies
/// narrowed to the ones emitted code uses, entry points from named outputs.
fn package_metadata(ctx: &BuildContext, usage: &DependencyUsage) -> PackageMetadata {
  let keep_used = |deps: &BTreeMap<String, String>| -> BTreeMap<String, String> {
    deps
      .iter()
      .filter(|(name, _)| usage.used.contains(*name))
      .map(|(name, version)| (name.clone(), version.clone()))
      .collect()
  };

  let out_dir = &ctx.options.out_dir;
  let root = &ctx.options.root_dir;
  let mut entry_points = Vec::new();
  for record in ctx.manifest.named() {
    let ext = full_extension(&record.path);
    if !ENTRY_EXTENSIONS.contains(&ext) {
      continue;
    }
    let Ok(rel) = root.join(&record.path).strip_prefix(out_dir).map(display_rel) else {
      continue;
    };
    let stem = &rel[..rel.len() - ext.len()];
    let types = TYPES_EXTENSIONS
      .iter()
      .map(|t| format!("{}{}", stem, t))
      .find(|candidate| ctx.manifest.contains(&display_path(root, &out_dir.join(candidate))))
      .map(|t| format!("./{}", t));

    entry_points.push(EntryPoint {
      subpath: if stem == "index" {
        ".".to_string()
      } else {
        format!("./{}", stem)
      },
      import: format!("./{}", rel),
      types,
    });
  }

  PackageMetadata {
    name: ctx.package.name.clone().unwrap_or_default(),
    version: ctx.package.version.clone().unwrap_or_else(|| "0.0.0".to_string()),
    license: ctx.package.license.clone(),
    description: ctx.package.description.clone(),
    dependencies: keep_used(&ctx.package.dependencies),
    peer_dependencies: keep_used(&ctx.package.peer_dependencies),
    entry_points,
  }
}

fn display_rel(path: &Path) -> String {
  path.to_string_lossy().replace('\\', "/")
}
