//! Input and output descriptors of the transform pipeline.

use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;

/// Compound extensions that must be treated as a single extension.
const COMPOUND_EXTENSIONS: &[&str] = &[".d.ts", ".d.mts", ".d.cts"];

/// The extension of `name` including the leading dot; compound declaration
/// extensions (`.d.ts`) are returned whole. Empty when there is none.
pub fn full_extension(name: &str) -> &str {
  let file_name = name.rsplit('/').next().unwrap_or(name);
  for ext in COMPOUND_EXTENSIONS {
    if file_name.len() > ext.len() && file_name.ends_with(ext) {
      return &file_name[file_name.len() - ext.len()..];
    }
  }
  match file_name.rfind('.') {
    Some(0) | None => "",
    Some(idx) => &file_name[idx..],
  }
}

/// Returns true for `.d.ts`, `.d.mts` and `.d.cts` paths.
pub fn is_declaration_path(name: &str) -> bool {
  COMPOUND_EXTENSIONS.contains(&full_extension(name))
}

/// Read-only view of one discovered source file.
///
/// Contents are read lazily, at most once, the first time a loader asks.
#[derive(Debug)]
pub struct InputFile {
  /// Path relative to the source directory, `/`-separated.
  pub rel_path: String,
  pub abs_path: PathBuf,
  /// Extension including the dot (`.ts`, `.d.ts`), empty if none.
  pub extension: String,
  contents: OnceCell<String>,
}

impl InputFile {
  pub fn new(rel_path: impl Into<String>, abs_path: impl Into<PathBuf>) -> Self {
    let rel_path = rel_path.into();
    let extension = full_extension(&rel_path).to_string();
    Self {
      rel_path,
      abs_path: abs_path.into(),
      extension,
      contents: OnceCell::new(),
    }
  }

  /// An input whose contents are already known (used by tests and stubs).
  pub fn with_contents(rel_path: impl Into<String>, abs_path: impl Into<PathBuf>, contents: String) -> Self {
    let input = Self::new(rel_path, abs_path);
    let _ = input.contents.set(contents);
    input
  }

  /// File contents, read from disk on first access.
  pub async fn contents(&self) -> io::Result<&str> {
    self
      .contents
      .get_or_try_init(|| tokio::fs::read_to_string(&self.abs_path))
      .await
      .map(String::as_str)
  }
}

/// One file the transform will write.
///
/// `rel_path` is private: its extension is normalized exactly once by
/// [`OutputFile::normalize_extension`] and is read-only afterwards.
#[derive(Debug, Clone)]
pub struct OutputFile {
  rel_path: String,
  normalized: bool,
  /// The source this output came from.
  pub src_path: PathBuf,
  /// Text to write; `None` for raw files, which are copied from `src_path`.
  pub contents: Option<String>,
  /// Target extension replacing the source extension, if any.
  pub extension: Option<String>,
  /// This output carries type declarations only.
  pub declaration: bool,
  /// Contents must come from the declaration extractor.
  pub declaration_request: bool,
  pub raw: bool,
  pub skip: bool,
  pub errors: Vec<String>,
}

impl OutputFile {
  fn base(input: &InputFile) -> Self {
    Self {
      rel_path: input.rel_path.clone(),
      normalized: false,
      src_path: input.abs_path.clone(),
      contents: None,
      extension: None,
      declaration: false,
      declaration_request: false,
      raw: false,
      skip: false,
      errors: Vec::new(),
    }
  }

  /// Emitted code with a target extension.
  pub fn code(input: &InputFile, contents: String, extension: impl Into<String>) -> Self {
    Self {
      contents: Some(contents),
      extension: Some(extension.into()),
      ..Self::base(input)
    }
  }

  /// A marker asking the declaration extractor for `input`'s declarations.
  /// `source` is the code handed to the extractor.
  pub fn declaration_request(input: &InputFile, source: String, extension: impl Into<String>) -> Self {
    Self {
      contents: Some(source),
      extension: Some(extension.into()),
      declaration: true,
      declaration_request: true,
      ..Self::base(input)
    }
  }

  /// A hand-written declaration file passed through unchanged.
  pub fn declaration(input: &InputFile, contents: String) -> Self {
    Self {
      contents: Some(contents),
      declaration: true,
      ..Self::base(input)
    }
  }

  /// Copy-through of a file no loader claimed.
  pub fn raw(input: &InputFile) -> Self {
    Self {
      raw: true,
      ..Self::base(input)
    }
  }

  pub fn rel_path(&self) -> &str {
    &self.rel_path
  }

  /// Replace the source extension of `rel_path` with the target extension.
  ///
  /// Only the first call has an effect.
  pub fn normalize_extension(&mut self) {
    if self.normalized {
      return;
    }
    self.normalized = true;

    let Some(target) = self.extension.as_deref() else {
      return;
    };
    let current = full_extension(&self.rel_path);
    let stem = &self.rel_path[..self.rel_path.len() - current.len()];
    self.rel_path = format!("{}{}", stem, target);
  }

  /// Final location under `dist`.
  pub fn dest_path(&self, dist: &Path) -> PathBuf {
    dist.join(&self.rel_path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extensions() {
    assert_eq!(full_extension("a.ts"), ".ts");
    assert_eq!(full_extension("dir.x/a.d.ts"), ".d.ts");
    assert_eq!(full_extension("types.d.mts"), ".d.mts");
    assert_eq!(full_extension("README"), "");
    assert_eq!(full_extension(".gitignore"), "");
    assert_eq!(full_extension("a.test.tsx"), ".tsx");
    assert!(is_declaration_path("x/y.d.cts"));
    assert!(!is_declaration_path("x/y.ts"));
  }

  #[test]
  fn normalize_replaces_extension_once() {
    let input = InputFile::with_contents("utils/helper.ts", "/src/utils/helper.ts", String::new());
    let mut output = OutputFile::code(&input, String::new(), ".mjs");
    output.normalize_extension();
    assert_eq!(output.rel_path(), "utils/helper.mjs");

    output.extension = Some(".cjs".to_string());
    output.normalize_extension();
    assert_eq!(output.rel_path(), "utils/helper.mjs");
  }

  #[test]
  fn declaration_request_gets_compound_extension() {
    let input = InputFile::with_contents("index.ts", "/src/index.ts", "export const a = 1;".to_string());
    let mut output = OutputFile::declaration_request(&input, "export const a = 1;".to_string(), ".d.mts");
    output.normalize_extension();
    assert_eq!(output.rel_path(), "index.d.mts");
    assert!(output.declaration);
  }

  #[test]
  fn raw_keeps_path() {
    let input = InputFile::new("assets/logo.svg", "/src/assets/logo.svg");
    let mut output = OutputFile::raw(&input);
    output.normalize_extension();
    assert_eq!(output.rel_path(), "assets/logo.svg");
    assert!(output.raw);
  }

  #[tokio::test]
  async fn contents_are_loaded_lazily_from_disk() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("a.ts");
    std::fs::write(&path, "export {}").unwrap();

    let input = InputFile::new("a.ts", &path);
    assert_eq!(input.contents().await.unwrap(), "export {}");
    std::fs::remove_file(&path).unwrap();
    assert_eq!(input.contents().await.unwrap(), "export {}");
  }
}
