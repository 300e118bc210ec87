//! Source discovery.

use std::path::Path;

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::consts::IGNORED_DIRS;

use super::TransformError;
use super::types::InputFile;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: false,
  require_literal_leading_dot: false,
};

fn compile(pattern: &str) -> Result<Pattern, TransformError> {
  Pattern::new(pattern).map_err(|source| TransformError::Pattern {
    pattern: pattern.to_string(),
    source,
  })
}

/// Discover the inputs under `src` matching `pattern` and none of `exclude`.
///
/// When `src` is a file it is the only input. Dependency, VCS and cache
/// directories are never descended into. Results are sorted by relative path.
pub fn discover(src: &Path, pattern: &str, exclude: &[String]) -> Result<Vec<InputFile>, TransformError> {
  if src.is_file() {
    let name = src
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_default();
    return Ok(vec![InputFile::new(name, src)]);
  }

  let include = compile(pattern)?;
  let exclude = exclude.iter().map(|p| compile(p)).collect::<Result<Vec<_>, _>>()?;

  let walker = WalkDir::new(src).sort_by_file_name().into_iter().filter_entry(|e| {
    e.depth() == 0
      || !e.file_type().is_dir()
      || e
        .file_name()
        .to_str()
        .map(|name| !IGNORED_DIRS.contains(&name))
        .unwrap_or(true)
  });

  let mut inputs = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|e| TransformError::Walk { message: e.to_string() })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let rel = entry
      .path()
      .strip_prefix(src)
      .unwrap_or(entry.path())
      .to_string_lossy()
      .replace('\\', "/");

    if !include.matches_with(&rel, MATCH_OPTIONS) {
      continue;
    }
    if exclude.iter().any(|p| p.matches_with(&rel, MATCH_OPTIONS)) {
      continue;
    }

    inputs.push(InputFile::new(rel, entry.path()));
  }

  Ok(inputs)
}
