//! Text-pattern scanning of module specifiers and exported symbols.
//!
//! Scanning is line based. Lines inside an inlined region (between
//! [`INLINE_START_SENTINEL`] and [`INLINE_END_SENTINEL`]) are opaque: no
//! specifier is ever reported from them, so content that was inlined by an
//! earlier pass is passed through verbatim on every later pass.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::consts::{INLINE_END_SENTINEL, INLINE_START_SENTINEL};

const QUOTED: &str = r#"(?:'([^'\n]+)'|"([^"\n]+)")"#;

static FROM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!(r"\bfrom\s*{QUOTED}")).unwrap());

static SIDE_EFFECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!(r"^\s*import\s*{QUOTED}")).unwrap());

static DYNAMIC_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(&format!(r"\bimport\s*\(\s*{QUOTED}\s*\)")).unwrap());

static REQUIRE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(&format!(r"\brequire\s*\(\s*{QUOTED}\s*\)")).unwrap());

static EXPORT_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?m)^\s*export\s+(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function\s*\*?|class|const|let|var|enum|interface|type|namespace)\s*([A-Za-z_$][\w$]*)",
  )
  .unwrap()
});

static EXPORT_DEFAULT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*export\s+default\b").unwrap());

static EXPORT_LIST_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^\s*export\s+(?:type\s+)?\{([^}]*)\}").unwrap());

static EXPORT_NS_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^\s*export\s+\*\s+as\s+([A-Za-z_$][\w$]*)").unwrap());

static CJS_EXPORT_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^\s*(?:module\.)?exports\.([A-Za-z_$][\w$]*)\s*=").unwrap());

static CJS_DEFAULT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*module\.exports\s*=").unwrap());

/// How a specifier is consumed by the module it appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
  /// `import ... from`, `export ... from`, or a side-effect `import '...'`.
  Static,
  /// `import('...')`.
  Dynamic,
  /// `require('...')`.
  Require,
}

/// A module specifier found in a file, with byte offsets of the text between
/// its quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
  pub value: String,
  pub start: usize,
  pub end: usize,
  pub kind: SpecifierKind,
}

impl Specifier {
  pub fn is_relative(&self) -> bool {
    is_relative(&self.value)
  }
}

/// Returns true for `./` and `../` specifiers (and bare `.`/`..`).
pub fn is_relative(specifier: &str) -> bool {
  specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// Iterate lines with their byte offset in `content`, excluding the newline.
pub fn lines_with_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
  let mut offset = 0;
  content.split_inclusive('\n').map(move |raw| {
    let start = offset;
    offset += raw.len();
    let line = raw.strip_suffix('\n').unwrap_or(raw);
    let line = line.strip_suffix('\r').unwrap_or(line);
    (start, line)
  })
}

/// Find every specifier in `content` outside inlined regions, in file order.
pub fn find_specifiers(content: &str) -> Vec<Specifier> {
  let mut found = Vec::new();
  let mut opaque = false;

  for (offset, line) in lines_with_offsets(content) {
    if opaque {
      if line.contains(INLINE_END_SENTINEL) {
        opaque = false;
      }
      continue;
    }
    if line.contains(INLINE_START_SENTINEL) {
      // a one-line region opens and closes on the same line
      opaque = !line.contains(INLINE_END_SENTINEL);
      continue;
    }
    found.extend(find_in_line(line, offset));
  }

  found
}

fn find_in_line(line: &str, offset: usize) -> Vec<Specifier> {
  let mut found = Vec::new();
  let trimmed = line.trim_start();

  let statement_line = trimmed.starts_with("import") || trimmed.starts_with("export") || trimmed.contains("} from");
  if statement_line {
    for caps in FROM_RE.captures_iter(line) {
      push_capture(&mut found, &caps, offset, SpecifierKind::Static);
    }
  }
  if let Some(caps) = SIDE_EFFECT_RE.captures(line) {
    push_capture(&mut found, &caps, offset, SpecifierKind::Static);
  }
  for caps in DYNAMIC_RE.captures_iter(line) {
    push_capture(&mut found, &caps, offset, SpecifierKind::Dynamic);
  }
  for caps in REQUIRE_RE.captures_iter(line) {
    push_capture(&mut found, &caps, offset, SpecifierKind::Require);
  }

  found.sort_by_key(|s| s.start);
  found.dedup_by_key(|s| s.start);
  found
}

fn push_capture(found: &mut Vec<Specifier>, caps: &Captures<'_>, offset: usize, kind: SpecifierKind) {
  let Some(m) = caps.get(1).or_else(|| caps.get(2)) else {
    return;
  };
  found.push(Specifier {
    value: m.as_str().to_string(),
    start: offset + m.start(),
    end: offset + m.end(),
    kind,
  });
}

/// Detect exported symbol names, sorted and deduplicated.
///
/// `default` is reported for default exports (ESM or `module.exports =`).
pub fn find_exports(content: &str) -> Vec<String> {
  let mut names = BTreeSet::new();

  for caps in EXPORT_DECL_RE.captures_iter(content) {
    names.insert(caps[1].to_string());
  }
  if EXPORT_DEFAULT_RE.is_match(content) || CJS_DEFAULT_RE.is_match(content) {
    names.insert("default".to_string());
  }
  for caps in EXPORT_LIST_RE.captures_iter(content) {
    for item in caps[1].split(',') {
      let item = item.trim().trim_start_matches("type ").trim();
      if item.is_empty() {
        continue;
      }
      let exported = item.rsplit_once(" as ").map(|(_, alias)| alias.trim()).unwrap_or(item);
      names.insert(exported.to_string());
    }
  }
  for caps in EXPORT_NS_RE.captures_iter(content) {
    names.insert(caps[1].to_string());
  }
  for caps in CJS_EXPORT_RE.captures_iter(content) {
    names.insert(caps[1].to_string());
  }

  names.into_iter().collect()
}

/// Package name of a bare specifier (`lodash/fp` -> `lodash`,
/// `@scope/pkg/sub` -> `@scope/pkg`, `npm:chalk@5` -> `chalk`).
///
/// Returns `None` for relative, absolute, URL-like and empty specifiers.
pub fn package_name(specifier: &str) -> Option<String> {
  let spec = specifier
    .strip_prefix("npm:")
    .or_else(|| specifier.strip_prefix("jsr:"))
    .unwrap_or(specifier);

  if spec.is_empty() || is_relative(spec) || spec.starts_with('/') || spec.starts_with('#') || spec.contains("://")
  {
    return None;
  }

  let mut parts = spec.splitn(3, '/');
  let first = parts.next()?;
  if let Some(scope) = first.strip_prefix('@') {
    if scope.is_empty() {
      return None;
    }
    let name = parts.next()?;
    let name = name.split('@').next().unwrap_or(name);
    if name.is_empty() {
      return None;
    }
    return Some(format!("@{scope}/{name}"));
  }

  let name = first.split('@').next().unwrap_or(first);
  if name.is_empty() || name.contains(':') {
    return None;
  }
  Some(name.to_string())
}
