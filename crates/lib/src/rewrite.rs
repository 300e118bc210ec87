//! Offset-based text edits.
//!
//! Both the transformer's specifier resolution and the linker collect their
//! edits as [`Replacement`]s against a file's original content, then apply
//! them in one pass from the end of the file backwards so earlier offsets
//! stay valid.

/// A pending edit replacing `content[start..end]` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
  pub start: usize,
  pub end: usize,
  pub text: String,
}

impl Replacement {
  pub fn new(start: usize, end: usize, text: impl Into<String>) -> Self {
    Self {
      start,
      end,
      text: text.into(),
    }
  }
}

/// Apply `replacements` to `content`.
///
/// Replacements are sorted by descending start offset before application.
/// Overlapping replacements are a caller bug and trip a debug assertion.
pub fn apply_replacements(content: &str, mut replacements: Vec<Replacement>) -> String {
  if replacements.is_empty() {
    return content.to_string();
  }

  replacements.sort_by(|a, b| b.start.cmp(&a.start));

  debug_assert!(
    replacements.windows(2).all(|w| w[1].end <= w[0].start),
    "overlapping replacements"
  );

  let mut out = content.to_string();
  for r in &replacements {
    out.replace_range(r.start..r.end, &r.text);
  }
  out
}
