//! Dependency validation of emitted code.

use std::collections::BTreeSet;
use std::fs;

use tracing::debug;

use crate::consts::is_node_builtin;
use crate::scan::{find_specifiers, package_name};
use crate::transform::types::full_extension;

use super::context::BuildContext;

/// Extensions of emitted code whose imports are checked.
const CODE_EXTENSIONS: &[&str] = &[".mjs", ".js", ".cjs", ".jsx"];

/// Packages referenced by emitted code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyUsage {
  pub used: BTreeSet<String>,
}

/// Collect every bare package referenced by the manifest's code files.
///
/// Built-ins, the package itself and sibling libraries are not dependencies.
pub fn collect_usage(ctx: &BuildContext) -> DependencyUsage {
  let mut exempt: BTreeSet<&str> = ctx
    .options
    .libraries
    .iter()
    .map(|l| l.package_name.as_str())
    .collect();
  if let Some(name) = ctx.package.name.as_deref() {
    exempt.insert(name);
  }

  let mut used = BTreeSet::new();
  for entry in &ctx.manifest.entries {
    if !CODE_EXTENSIONS.contains(&full_extension(&entry.path)) {
      continue;
    }
    let path = ctx.options.root_dir.join(&entry.path);
    let Ok(content) = fs::read_to_string(&path) else {
      debug!(path = %path.display(), "skipping unreadable output");
      continue;
    };
    for specifier in find_specifiers(&content) {
      if specifier.value.starts_with(ctx.options.alias_prefix.as_str()) || is_node_builtin(&specifier.value) {
        continue;
      }
      if let Some(name) = package_name(&specifier.value)
        && !exempt.contains(name.as_str())
      {
        used.insert(name);
      }
    }
  }

  DependencyUsage { used }
}

/// Warn on packages used but not declared as runtime or peer dependencies,
/// and on runtime dependencies never used. Never touches output.
pub fn validate_dependencies(ctx: &mut BuildContext) -> DependencyUsage {
  let usage = collect_usage(ctx);
  let declared = ctx.package.runtime_dependency_names();

  for name in usage.used.difference(&declared) {
    ctx.warn(format!(
      "potential missing package: {} is imported but not listed in dependencies or peerDependencies",
      name
    ));
  }
  for name in declared.difference(&usage.used) {
    ctx.warn(format!("potential unused dependency: {} is declared but never imported", name));
  }

  usage
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::build::context::tests::test_context;
  use crate::build::types::ManifestEntry;

  fn record(path: &str) -> ManifestEntry {
    ManifestEntry {
      path: path.to_string(),
      bytes: 0,
      chunk: false,
      chunks: vec![],
      exports: vec![],
    }
  }

  #[test]
  fn flags_missing_and_unused_dependencies() {
    let temp = tempfile::tempdir().unwrap();
    fs::create_dir_all(temp.path().join("dist")).unwrap();
    fs::write(
      temp.path().join("dist/index.mjs"),
      "import fs from 'node:fs';\nimport { defu } from 'defu';\nimport x from 'undeclared/sub';\nimport './local.mjs';\nimport self from 'my-pkg/util';\n",
    )
    .unwrap();
    fs::write(temp.path().join("dist/types.d.mts"), "import type { T } from 'types-only';\n").unwrap();

    let mut ctx = test_context();
    ctx.options.root_dir = temp.path().to_path_buf();
    ctx.package.name = Some("my-pkg".to_string());
    ctx.package.dependencies = BTreeMap::from([
      ("defu".to_string(), "^6".to_string()),
      ("left-pad".to_string(), "^1".to_string()),
    ]);
    ctx.manifest.push(record("dist/index.mjs"));
    ctx.manifest.push(record("dist/types.d.mts"));

    let usage = validate_dependencies(&mut ctx);

    assert_eq!(
      usage.used,
      BTreeSet::from(["defu".to_string(), "undeclared".to_string()])
    );
    assert_eq!(ctx.warnings().len(), 2);
    assert!(ctx.warnings()[0].contains("undeclared"));
    assert!(ctx.warnings()[1].contains("left-pad"));
  }

  #[test]
  fn peer_dependencies_count_as_declared() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("a.mjs"), "import React from 'react';\n").unwrap();

    let mut ctx = test_context();
    ctx.options.root_dir = temp.path().to_path_buf();
    ctx.package.peer_dependencies = BTreeMap::from([("react".to_string(), "^19".to_string())]);
    ctx.manifest.push(record("a.mjs"));

    validate_dependencies(&mut ctx);
    assert!(ctx.warnings().is_empty(), "{:?}", ctx.warnings());
  }
}
