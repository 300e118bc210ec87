//! Entry normalization.

use std::path::Path;

use crate::config::{BuilderKind, RawEntry, ResolvedConfig};
use crate::link::LibraryDescriptor;
use crate::link::paths::normalize;
use crate::transform::types::full_extension;

use super::types::{BuildEntry, BuildError, BuildOptions};

impl BuildOptions {
  /// Resolve `config` against `root` and normalize every entry.
  pub fn from_config(root: &Path, stub: bool, config: &ResolvedConfig) -> Result<Self, BuildError> {
    let root_dir = normalize(root);
    let out_dir = normalize(&root_dir.join(&config.out_dir));

    let entries = config
      .entries
      .iter()
      .enumerate()
      .map(|(index, raw)| normalize_entry(index, raw, &root_dir, &out_dir, config.declaration))
      .collect::<Result<Vec<_>, _>>()?;

    let libraries = config
      .libraries
      .iter()
      .map(|raw| LibraryDescriptor::from_raw(raw, &root_dir, &out_dir))
      .collect();

    Ok(Self {
      root_dir,
      out_dir,
      entries,
      externals: config.externals.clone(),
      clean: config.clean,
      parallel: config.parallel,
      fail_on_warn: config.fail_on_warn,
      stub,
      declaration: config.declaration,
      transform: config.transform.clone(),
      libraries,
      alias_prefix: config.alias_prefix.clone(),
      side_dir: config.side_dir.clone(),
      registries: config.registries.clone(),
    })
  }
}

/// Normalize one configured entry.
///
/// A trailing separator on `input` marks a directory and selects the mirror
/// builder unless one is configured.
pub fn normalize_entry(
  index: usize,
  raw: &RawEntry,
  root: &Path,
  default_out_dir: &Path,
  declaration: bool,
) -> Result<BuildEntry, BuildError> {
  let input = raw
    .input
    .as_deref()
    .filter(|i| !i.trim().is_empty())
    .ok_or(BuildError::MissingInput { index })?;

  let is_dir = input.ends_with('/') || input.ends_with('\\');
  let builder = raw
    .builder
    .unwrap_or(if is_dir { BuilderKind::Mirror } else { BuilderKind::Transform });

  let out_dir = match &raw.out_dir {
    Some(dir) => normalize(&root.join(dir)),
    None => default_out_dir.to_path_buf(),
  };

  Ok(BuildEntry {
    builder,
    input: normalize(&root.join(input.trim_end_matches(['/', '\\']))),
    out_dir,
    name: raw.name.clone().unwrap_or_else(|| infer_name(input)),
    declaration: raw.declaration.unwrap_or(declaration),
    is_lib: raw.is_lib.unwrap_or(false),
  })
}

/// Entry name from its input: leading `src/` and the extension stripped.
/// A bare source directory is named after itself.
pub fn infer_name(input: &str) -> String {
  let rel = input.replace('\\', "/");
  let rel = rel.trim_start_matches("./").trim_end_matches('/');
  let stripped = rel.strip_prefix("src/").unwrap_or(rel);
  let name = &stripped[..stripped.len() - full_extension(stripped).len()];

  if !name.is_empty() {
    return name.to_string();
  }
  match rel.rsplit('/').next() {
    Some(last) if !last.is_empty() => last.to_string(),
    _ => "index".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use crate::config::{ConfigLayers, PartialConfig};

  #[test]
  fn infers_names() {
    assert_eq!(infer_name("src/index.ts"), "index");
    assert_eq!(infer_name("./src/cli/main.ts"), "cli/main");
    assert_eq!(infer_name("src/types.d.ts"), "types");
    assert_eq!(infer_name("lib/utils.mjs"), "lib/utils");
    assert_eq!(infer_name("src/runtime/"), "runtime");
    assert_eq!(infer_name("src/"), "src");
  }

  #[test]
  fn infers_builder_from_trailing_separator() {
    let root = Path::new("/repo");
    let out = Path::new("/repo/dist");
    let dir = RawEntry {
      input: Some("src/runtime/".to_string()),
      ..Default::default()
    };
    let file = RawEntry {
      input: Some("src/index.ts".to_string()),
      declaration: Some(true),
      ..Default::default()
    };

    let dir = normalize_entry(0, &dir, root, out, false).unwrap();
    assert_eq!(dir.builder, BuilderKind::Mirror);
    assert_eq!(dir.input, PathBuf::from("/repo/src/runtime"));
    assert_eq!(dir.out_dir, PathBuf::from("/repo/dist"));
    assert!(!dir.declaration);

    let file = normalize_entry(1, &file, root, out, false).unwrap();
    assert_eq!(file.builder, BuilderKind::Transform);
    assert_eq!(file.name, "index");
    assert!(file.declaration);
  }

  #[test]
  fn explicit_fields_win() {
    let raw = RawEntry {
      input: Some("src/".to_string()),
      out_dir: Some("dist/esm".to_string()),
      name: Some("runtime".to_string()),
      builder: Some(BuilderKind::Copy),
      is_lib: Some(true),
      ..Default::default()
    };
    let entry = normalize_entry(0, &raw, Path::new("/repo"), Path::new("/repo/dist"), true).unwrap();
    assert_eq!(entry.builder, BuilderKind::Copy);
    assert_eq!(entry.out_dir, PathBuf::from("/repo/dist/esm"));
    assert_eq!(entry.name, "runtime");
    assert!(entry.is_lib);
    assert!(entry.declaration);
  }

  #[test]
  fn missing_input_names_the_entry() {
    let config = ConfigLayers {
      project: PartialConfig {
        entries: Some(vec![
          RawEntry {
            input: Some("src/".to_string()),
            ..Default::default()
          },
          RawEntry::default(),
        ]),
        ..Default::default()
      },
      ..Default::default()
    }
    .resolve();

    let err = BuildOptions::from_config(Path::new("/repo"), false, &config).unwrap_err();
    assert!(matches!(err, BuildError::MissingInput { index: 1 }));
  }

  #[test]
  fn options_resolve_paths_against_root() {
    let config = ConfigLayers::default().resolve();
    let options = BuildOptions::from_config(Path::new("/repo"), true, &config).unwrap();
    assert_eq!(options.out_dir, PathBuf::from("/repo/dist"));
    assert_eq!(options.entries[0].input, PathBuf::from("/repo/src"));
    assert!(options.stub);
  }
}
