//! Lexical path helpers and the local-file resolution search.

use std::path::{Component, Path, PathBuf};

use crate::transform::types::{full_extension, is_declaration_path};

/// Resolution order for code importers.
const CODE_FIRST: &[&str] = &[".ts", ".tsx", ".mts", ".cts", ".js", ".mjs", ".cjs", ".d.ts", ".d.mts"];

/// Resolution order for declaration importers.
const DECLARATION_FIRST: &[&str] = &[".d.ts", ".d.mts", ".d.cts", ".ts", ".tsx", ".mts", ".js", ".mjs", ".cjs"];

/// Extensions a file may carry for the linker to scan it.
pub const LINKABLE_EXTENSIONS: &[&str] = &[
  ".js", ".mjs", ".cjs", ".jsx", ".ts", ".mts", ".cts", ".tsx", ".d.ts", ".d.mts", ".d.cts",
];

/// Source extensions a specifier may carry that do not exist in an output tree.
const SOURCE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".mts", ".cts"];

/// Extensions of files a runtime or type checker loads as written.
const EMITTED_EXTENSIONS: &[&str] = &[".mjs", ".js", ".cjs", ".d.mts", ".d.ts", ".d.cts"];

/// Output forms tried when checking whether a relative specifier already
/// points into an output tree.
const OUTPUT_PROBES: &[&str] = &[
  "",
  ".mjs",
  ".js",
  ".cjs",
  ".d.mts",
  ".d.ts",
  ".d.cts",
  ".ts",
  ".tsx",
  ".mts",
  ".cts",
  "/index.mjs",
  "/index.js",
  "/index.d.mts",
  "/index.d.ts",
];

pub fn is_linkable(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .map(|name| LINKABLE_EXTENSIONS.contains(&full_extension(name)))
    .unwrap_or(false)
}

pub fn is_declaration_file(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .map(is_declaration_path)
    .unwrap_or(false)
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// A `/`-separated specifier leading from directory `from` to `to`, prefixed
/// with `./` unless it climbs upward.
pub fn relative_specifier(from: &Path, to: &Path) -> String {
  let from: Vec<Component> = from.components().collect();
  let to_parts: Vec<Component> = to.components().collect();
  let common = from.iter().zip(to_parts.iter()).take_while(|(a, b)| a == b).count();

  let mut parts: Vec<String> = Vec::new();
  for _ in common..from.len() {
    parts.push("..".to_string());
  }
  for component in &to_parts[common..] {
    parts.push(component.as_os_str().to_string_lossy().to_string());
  }

  let joined = parts.join("/");
  if joined.starts_with("..") {
    joined
  } else {
    format!("./{}", joined)
  }
}

/// Find the concrete file `base` refers to, trying it as-is, with each
/// extension, and as a directory index. Declaration importers prefer
/// declaration files.
pub fn resolve_local(base: &Path, declaration_importer: bool) -> Option<PathBuf> {
  if base.is_file() {
    return Some(base.to_path_buf());
  }

  let order = if declaration_importer {
    DECLARATION_FIRST
  } else {
    CODE_FIRST
  };
  let raw = base.as_os_str().to_string_lossy();

  order
    .iter()
    .map(|ext| PathBuf::from(format!("{}{}", raw, ext)))
    .chain(order.iter().map(|ext| base.join(format!("index{}", ext))))
    .find(|candidate| candidate.is_file())
}

/// True when `spec`, relative to `from_dir`, already names a file inside
/// `out_dir`.
pub fn exists_in_output(from_dir: &Path, spec: &str, out_dir: &Path) -> bool {
  let target = normalize(&from_dir.join(spec));
  if !target.starts_with(out_dir) {
    return false;
  }
  let raw = target.as_os_str().to_string_lossy();
  OUTPUT_PROBES
    .iter()
    .any(|suffix| PathBuf::from(format!("{}{}", raw, suffix)).is_file())
}

/// Map an output-space target to the form the output tree actually holds: a
/// source extension (`.ts`), or none at all, is swapped for whichever emitted
/// sibling exists.
pub fn output_form(target: &Path) -> PathBuf {
  if target.exists() {
    return target.to_path_buf();
  }
  let name = target.to_string_lossy();
  let ext = full_extension(&name);
  if !ext.is_empty() && !SOURCE_EXTENSIONS.contains(&ext) {
    return target.to_path_buf();
  }
  let stem = &name[..name.len() - ext.len()];
  [".mjs", ".js", ".cjs", ".d.mts", ".d.ts"]
    .iter()
    .map(|out| PathBuf::from(format!("{}{}", stem, out)))
    .find(|candidate| candidate.is_file())
    .unwrap_or_else(|| target.to_path_buf())
}

/// The specifier leading from directory `from` to `target`. An emitted file is
/// always named with its extension; any other target keeps the extension form
/// of `original`.
pub fn specifier_to(original: &str, from: &Path, target: &Path) -> String {
  let spec = relative_specifier(from, target);
  if EMITTED_EXTENSIONS.contains(&full_extension(&target.to_string_lossy())) {
    spec
  } else {
    match_extension_form(original, spec)
  }
}

/// Drop the extension of `spec` when the original specifier had none.
pub fn match_extension_form(original: &str, rewritten: String) -> String {
  let original_name = original.rsplit('/').next().unwrap_or(original);
  if !full_extension(original_name).is_empty() {
    return rewritten;
  }
  let ext = full_extension(&rewritten).len();
  rewritten[..rewritten.len() - ext].to_string()
}
