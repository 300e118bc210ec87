//! Stub outputs.
//!
//! A stub build writes tiny modules that re-export the sources by absolute
//! path, so a consuming project runs against live sources without rebuilds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::BuilderKind;
use crate::scan::find_exports;
use crate::transform::TransformError;
use crate::transform::discover::discover;
use crate::transform::types::{full_extension, is_declaration_path};

use super::backends::{BackendEnv, BackendOutput, record, resolve_input};
use super::types::{BuildEntry, BuildError, display_path};

const STUBBED_EXTENSIONS: &[&str] = &[".ts", ".mts", ".cts", ".tsx", ".jsx", ".js", ".mjs", ".cjs"];
const TYPED_EXTENSIONS: &[&str] = &[".ts", ".mts", ".cts", ".tsx"];

/// The stub module for `source`.
pub fn stub_contents(source: &Path, has_default: bool) -> String {
  let target = source.to_string_lossy().replace('\\', "/");
  let mut out = format!("export * from {:?};\n", target);
  if has_default {
    out.push_str(&format!("export {{ default }} from {:?};\n", target));
  }
  out
}

fn code_extension(source_ext: &str, esm_extension: &str) -> String {
  match source_ext {
    ".cts" | ".cjs" => ".cjs".to_string(),
    ".mts" | ".mjs" => ".mjs".to_string(),
    _ => esm_extension.to_string(),
  }
}

pub(crate) async fn stub_entry(entry: &BuildEntry, env: &BackendEnv) -> Result<BackendOutput, BuildError> {
  let src = resolve_input(entry)?;

  // (source, output path without extension, named)
  let targets: Vec<(PathBuf, PathBuf, bool)> = if src.is_file() {
    vec![(src.clone(), entry.out_dir.join(&entry.name), true)]
  } else {
    let pattern = env.options.transform.pattern.clone();
    let exclude = env.options.transform.exclude.clone();
    let dir = src.clone();
    let inputs = tokio::task::spawn_blocking(move || discover(&dir, &pattern, &exclude))
      .await
      .map_err(|e| BuildError::Task { message: e.to_string() })?
      .map_err(|source| BuildError::Transform {
        entry: entry.name.clone(),
        source,
      })?;

    inputs
      .into_iter()
      .filter(|i| !is_declaration_path(&i.rel_path) && STUBBED_EXTENSIONS.contains(&i.extension.as_str()))
      .map(|i| {
        let stem = &i.rel_path[..i.rel_path.len() - i.extension.len()];
        let named = entry.builder == BuilderKind::Mirror && stem == "index";
        (i.abs_path.clone(), entry.out_dir.join(stem), named)
      })
      .collect()
  };

  // every path is claimed before anything is written
  let mut planned: Vec<(PathBuf, PathBuf, Option<PathBuf>, bool)> = Vec::with_capacity(targets.len());
  let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
  for (source, base, named) in targets {
    let source_ext = full_extension(&source.to_string_lossy()).to_string();
    let code_path = with_suffix(&base, &code_extension(&source_ext, &env.options.transform.esm_extension));
    let decl_path = (entry.declaration && TYPED_EXTENSIONS.contains(&source_ext.as_str()))
      .then(|| with_suffix(&base, &env.options.transform.declaration_extension));

    for path in std::iter::once(&code_path).chain(decl_path.as_ref()) {
      if let Some(first) = claimed.insert(path.clone(), source.clone()) {
        return Err(BuildError::Transform {
          entry: entry.name.clone(),
          source: TransformError::PathConflict {
            path: display_path(&entry.out_dir, path),
            first,
            second: source.clone(),
          },
        });
      }
    }
    planned.push((source, code_path, decl_path, named));
  }

  let mut output = BackendOutput::default();
  for (source, code_path, decl_path, named) in planned {
    let source_text = tokio::fs::read_to_string(&source).await.map_err(BuildError::io(&source))?;
    let contents = stub_contents(&source, find_exports(&source_text).iter().any(|e| e == "default"));

    write_stub(&code_path, &contents).await?;
    output.records.push(record(
      &env.options.root_dir,
      &code_path,
      contents.len() as u64,
      !named,
      Some(&contents),
    ));

    if let Some(decl_path) = decl_path {
      write_stub(&decl_path, &contents).await?;
      output
        .records
        .push(record(&env.options.root_dir, &decl_path, contents.len() as u64, true, None));
    }
  }
  Ok(output)
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
  let mut raw = base.as_os_str().to_os_string();
  raw.push(suffix);
  PathBuf::from(raw)
}

async fn write_stub(path: &Path, contents: &str) -> Result<(), BuildError> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(BuildError::io(parent))?;
  }
  tokio::fs::write(path, contents).await.map_err(BuildError::io(path))
}
