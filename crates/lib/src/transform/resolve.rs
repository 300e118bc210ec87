//! Extension normalization, conflict detection and specifier resolution.
//!
//! These passes run over the complete in-memory output set, strictly before
//! anything is written.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::rewrite::{Replacement, apply_replacements};
use crate::scan::find_specifiers;

use super::TransformError;
use super::types::{OutputFile, full_extension};

/// Suffixes tried for static-import (ESM) outputs, in priority order.
pub const ESM_CANDIDATES: &[&str] = &["", "/index.mjs", "/index.js", ".mjs", ".js"];

/// Suffixes tried for `require` (CommonJS) outputs, in priority order.
pub const CJS_CANDIDATES: &[&str] = &["", ".cjs", "/index.cjs"];

/// Normalize every output's extension, then fail if two non-skipped outputs
/// end up at the same path.
pub fn normalize_and_check(outputs: &mut [OutputFile]) -> Result<(), TransformError> {
  for output in outputs.iter_mut() {
    output.normalize_extension();
  }

  let mut seen: HashMap<&str, &OutputFile> = HashMap::new();
  for output in outputs.iter().filter(|o| !o.skip) {
    if let Some(first) = seen.insert(output.rel_path(), output) {
      return Err(TransformError::PathConflict {
        path: output.rel_path().to_string(),
        first: first.src_path.clone(),
        second: output.src_path.clone(),
      });
    }
  }
  Ok(())
}

/// The candidate list for an output path, or `None` for files that carry no
/// module specifiers.
pub fn candidates_for(rel_path: &str) -> Option<&'static [&'static str]> {
  match full_extension(rel_path) {
    ".mjs" | ".js" | ".d.ts" | ".d.mts" => Some(ESM_CANDIDATES),
    ".cjs" | ".d.cts" => Some(CJS_CANDIDATES),
    _ => None,
  }
}

/// Lexically join `spec` onto directory `base` (both `/`-separated).
///
/// Returns `None` when the result would escape the output root.
pub fn join_relative(base: &str, spec: &str) -> Option<String> {
  let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
  for segment in spec.split('/') {
    match segment {
      "" | "." => {}
      ".." => {
        parts.pop()?;
      }
      other => parts.push(other),
    }
  }
  Some(parts.join("/"))
}

fn parent_dir(rel_path: &str) -> &str {
  rel_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve `spec` (relative, found in the file at `importer`) against the
/// output index. Returns the rewritten specifier when a non-empty candidate
/// matched first.
pub fn resolve_specifier(
  importer: &str,
  spec: &str,
  index: &HashSet<String>,
  candidates: &[&str],
) -> Option<String> {
  let trimmed = spec.trim_end_matches('/');
  let trimmed = if trimmed.is_empty() { spec } else { trimmed };
  let target = join_relative(parent_dir(importer), trimmed)?;

  for candidate in candidates {
    let probe = if target.is_empty() {
      // the output root itself: only directory-index candidates apply
      match candidate.strip_prefix('/') {
        Some(index_file) => index_file.to_string(),
        None => continue,
      }
    } else {
      format!("{}{}", target, candidate)
    };
    if probe.is_empty() || !index.contains(&probe) {
      continue;
    }
    if candidate.is_empty() {
      return None;
    }
    return Some(format!("{}{}", trimmed, candidate));
  }
  None
}

/// Output paths of `outputs` that will be written.
pub fn output_index(outputs: &[OutputFile]) -> HashSet<String> {
  outputs
    .iter()
    .filter(|o| !o.skip)
    .map(|o| o.rel_path().to_string())
    .collect()
}

/// Rewrite extensionless relative specifiers in every text output.
pub fn resolve_specifiers(outputs: &mut [OutputFile], index: &HashSet<String>) {
  for output in outputs.iter_mut().filter(|o| !o.skip && !o.raw) {
    let Some(candidates) = candidates_for(output.rel_path()) else {
      continue;
    };
    let Some(contents) = output.contents.as_deref() else {
      continue;
    };

    let replacements: Vec<Replacement> = find_specifiers(contents)
      .into_iter()
      .filter(|s| s.is_relative())
      .filter_map(|s| {
        let resolved = resolve_specifier(output.rel_path(), &s.value, index, candidates)?;
        trace!(file = output.rel_path(), from = %s.value, to = %resolved, "resolved specifier");
        Some(Replacement::new(s.start, s.end, resolved))
      })
      .collect();

    if !replacements.is_empty() {
      output.contents = Some(apply_replacements(contents, replacements));
    }
  }
}

/// Relative output paths a file imports, resolved against the index. Used
/// for the manifest's chunk lists.
pub fn imported_outputs(rel_path: &str, contents: &str, index: &HashSet<String>) -> Vec<String> {
  let mut found: Vec<String> = find_specifiers(contents)
    .into_iter()
    .filter(|s| s.is_relative())
    .filter_map(|s| join_relative(parent_dir(rel_path), &s.value))
    .filter(|target| index.contains(target))
    .collect();
  found.sort();
  found.dedup();
  found
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transform::types::InputFile;

  fn index(paths: &[&str]) -> HashSet<String> {
    paths.iter().map(|p| p.to_string()).collect()
  }

  fn code(rel: &str, contents: &str, ext: &str) -> OutputFile {
    let input = InputFile::with_contents(rel, format!("/src/{}", rel), contents.to_string());
    OutputFile::code(&input, contents.to_string(), ext)
  }

  #[test]
  fn join_handles_dots_and_escapes() {
    assert_eq!(join_relative("utils", "./helper"), Some("utils/helper".to_string()));
    assert_eq!(join_relative("a/b", "../c"), Some("a/c".to_string()));
    assert_eq!(join_relative("", "./x"), Some("x".to_string()));
    assert_eq!(join_relative("", "../x"), None);
  }

  #[test]
  fn first_matching_candidate_wins() {
    let idx = index(&["utils/helper.js", "utils/helper/index.mjs"]);
    assert_eq!(
      resolve_specifier("utils/a.mjs", "./helper", &idx, ESM_CANDIDATES),
      Some("./helper/index.mjs".to_string())
    );

    let idx = index(&["utils/helper.js", "utils/helper.mjs"]);
    assert_eq!(
      resolve_specifier("utils/a.mjs", "./helper", &idx, ESM_CANDIDATES),
      Some("./helper.mjs".to_string())
    );
  }

  #[test]
  fn existing_target_is_left_alone() {
    let idx = index(&["helper.mjs"]);
    assert_eq!(resolve_specifier("a.mjs", "./helper.mjs", &idx, ESM_CANDIDATES), None);
  }

  #[test]
  fn unresolved_specifier_is_left_alone() {
    let idx = index(&["other.mjs"]);
    assert_eq!(resolve_specifier("a.mjs", "./missing", &idx, ESM_CANDIDATES), None);
  }

  #[test]
  fn directory_specifiers() {
    let idx = index(&["index.mjs", "lib/index.mjs"]);
    assert_eq!(
      resolve_specifier("lib/x.mjs", "..", &idx, ESM_CANDIDATES),
      Some("../index.mjs".to_string())
    );
    assert_eq!(
      resolve_specifier("a.mjs", "./lib/", &idx, ESM_CANDIDATES),
      Some("./lib/index.mjs".to_string())
    );
  }

  #[test]
  fn cjs_uses_its_own_list() {
    let idx = index(&["helper.cjs", "helper.mjs"]);
    assert_eq!(
      resolve_specifier("a.cjs", "./helper", &idx, CJS_CANDIDATES),
      Some("./helper.cjs".to_string())
    );
  }

  #[test]
  fn rewrites_helper_import_to_js() {
    let mut outputs = vec![
      code("utils/helper.ts", "export const add = (a, b) => a + b;", ".js"),
      code("utils/sum.ts", "import { add } from './helper';\nexport default add;\n", ".js"),
    ];
    normalize_and_check(&mut outputs).unwrap();
    let idx = output_index(&outputs);
    resolve_specifiers(&mut outputs, &idx);

    assert_eq!(
      outputs[1].contents.as_deref(),
      Some("import { add } from './helper.js';\nexport default add;\n")
    );
  }

  #[test]
  fn rewrites_require_in_cjs_outputs() {
    let mut outputs = vec![
      code("a.cts", "const b = require('./b');\n", ".cjs"),
      code("b.cts", "module.exports = 1;\n", ".cjs"),
    ];
    normalize_and_check(&mut outputs).unwrap();
    let idx = output_index(&outputs);
    resolve_specifiers(&mut outputs, &idx);
    assert_eq!(outputs[0].contents.as_deref(), Some("const b = require('./b.cjs');\n"));
  }

  #[test]
  fn conflict_names_both_sources() {
    let mut outputs = vec![code("a.ts", "", ".js"), code("a.tsx", "", ".js")];
    let err = normalize_and_check(&mut outputs).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("a.ts"), "{}", message);
    assert!(message.contains("a.tsx"), "{}", message);
    assert!(message.contains("a.js"), "{}", message);
  }

  #[test]
  fn skipped_outputs_do_not_conflict() {
    let mut outputs = vec![code("a.ts", "", ".js"), code("a.tsx", "", ".js")];
    outputs[1].skip = true;
    assert!(normalize_and_check(&mut outputs).is_ok());
  }

  #[test]
  fn imported_outputs_lists_local_chunks() {
    let idx = index(&["a.mjs", "shared/chunk.mjs"]);
    let chunks = imported_outputs(
      "a.mjs",
      "import x from './shared/chunk.mjs';\nimport y from 'dep';\nimport z from './gone.mjs';\n",
      &idx,
    );
    assert_eq!(chunks, vec!["shared/chunk.mjs"]);
  }
}
