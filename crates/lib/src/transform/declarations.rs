//! Declaration generation.
//!
//! Type checking lives outside this crate. The transform collects every
//! declaration request into one virtual source set and hands it to a
//! [`DeclarationExtractor`] in a single call, because declarations of one file
//! may reference types from any other file in the set.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::types::OutputFile;

/// Result of extracting declarations for one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclarationOutput {
  pub contents: Option<String>,
  pub errors: Vec<String>,
}

/// Compiler-facing options of one extraction batch.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
  pub root_dir: PathBuf,
  pub src_dir: PathBuf,
  pub declaration_extension: String,
}

/// External declaration (type signature) extractor.
#[async_trait]
pub trait DeclarationExtractor: Send + Sync {
  /// Extract declarations for `files` (source path -> content).
  ///
  /// The returned map is keyed by source path. Sources with no entry are
  /// treated as failed.
  async fn extract(
    &self,
    files: &BTreeMap<PathBuf, String>,
    options: &ExtractOptions,
  ) -> HashMap<PathBuf, DeclarationOutput>;
}

/// Extractor used when none is configured: every request fails with a
/// per-file error, which never aborts the build.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableExtractor;

#[async_trait]
impl DeclarationExtractor for UnavailableExtractor {
  async fn extract(
    &self,
    files: &BTreeMap<PathBuf, String>,
    _options: &ExtractOptions,
  ) -> HashMap<PathBuf, DeclarationOutput> {
    files
      .keys()
      .map(|path| {
        (
          path.clone(),
          DeclarationOutput {
            contents: None,
            errors: vec!["no declaration extractor configured".to_string()],
          },
        )
      })
      .collect()
  }
}

/// Fill every declaration request in `outputs` from one extractor call.
///
/// Requests that come back without contents are skipped and carry the
/// extractor's errors.
pub async fn generate_declarations(
  outputs: &mut [OutputFile],
  extractor: &dyn DeclarationExtractor,
  options: &ExtractOptions,
) {
  if !outputs.iter().any(|o| o.declaration_request) {
    return;
  }

  // hand-written declarations join the set so requests can reference them
  let files: BTreeMap<PathBuf, String> = outputs
    .iter()
    .filter(|o| o.declaration)
    .filter_map(|o| o.contents.clone().map(|c| (o.src_path.clone(), c)))
    .collect();

  debug!(files = files.len(), "extracting declarations");
  let mut results = extractor.extract(&files, options).await;

  for output in outputs.iter_mut().filter(|o| o.declaration_request) {
    let result = results.remove(&output.src_path).unwrap_or_else(|| DeclarationOutput {
      contents: None,
      errors: vec!["no declaration produced".to_string()],
    });

    output.errors.extend(result.errors);
    match result.contents {
      Some(contents) => output.contents = Some(contents),
      None => {
        warn!(
          file = %output.src_path.display(),
          errors = ?output.errors,
          "declaration generation failed"
        );
        output.contents = None;
        output.skip = true;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::transform::types::InputFile;

  /// Emits `// d.ts` + the first line of each requested source, and records
  /// how often and with which files it was called.
  #[derive(Default)]
  struct Recording {
    calls: Mutex<Vec<Vec<PathBuf>>>,
  }

  #[async_trait]
  impl DeclarationExtractor for Recording {
    async fn extract(
      &self,
      files: &BTreeMap<PathBuf, String>,
      _options: &ExtractOptions,
    ) -> HashMap<PathBuf, DeclarationOutput> {
      self.calls.lock().unwrap().push(files.keys().cloned().collect());
      files
        .iter()
        .filter(|(path, _)| !path.ends_with("broken.ts"))
        .map(|(path, content)| {
          (
            path.clone(),
            DeclarationOutput {
              contents: Some(format!("// d.ts\n{}", content.lines().next().unwrap_or(""))),
              errors: vec![],
            },
          )
        })
        .collect()
    }
  }

  fn options() -> ExtractOptions {
    ExtractOptions {
      root_dir: PathBuf::from("/"),
      src_dir: PathBuf::from("/src"),
      declaration_extension: ".d.mts".to_string(),
    }
  }

  fn request(rel: &str, content: &str) -> OutputFile {
    let input = InputFile::with_contents(rel, format!("/src/{}", rel), content.to_string());
    OutputFile::declaration_request(&input, content.to_string(), ".d.mts")
  }

  #[tokio::test]
  async fn extracts_in_one_batch() {
    let extractor = Recording::default();
    let handwritten = InputFile::with_contents("types.d.ts", "/src/types.d.ts", String::new());
    let mut outputs = vec![
      request("a.ts", "export const a = 1;"),
      request("b.ts", "export const b = 2;"),
      OutputFile::declaration(&handwritten, "export type T = 1;".to_string()),
    ];

    generate_declarations(&mut outputs, &extractor, &options()).await;

    let calls = extractor.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 3);
    assert_eq!(outputs[0].contents.as_deref(), Some("// d.ts\nexport const a = 1;"));
    assert!(!outputs[1].skip);
  }

  #[tokio::test]
  async fn failures_are_per_file() {
    let extractor = Recording::default();
    let mut outputs = vec![request("ok.ts", "export {}"), request("broken.ts", "export {")];

    generate_declarations(&mut outputs, &extractor, &options()).await;

    assert!(!outputs[0].skip);
    assert!(outputs[1].skip);
    assert_eq!(outputs[1].errors, vec!["no declaration produced"]);
  }

  #[tokio::test]
  async fn no_requests_means_no_call() {
    let extractor = Recording::default();
    let input = InputFile::with_contents("a.js", "/src/a.js", String::new());
    let mut outputs = vec![OutputFile::code(&input, String::new(), ".mjs")];

    generate_declarations(&mut outputs, &extractor, &options()).await;
    assert!(extractor.calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn unavailable_extractor_marks_errors() {
    let mut outputs = vec![request("a.ts", "export {}")];
    generate_declarations(&mut outputs, &UnavailableExtractor, &options()).await;
    assert!(outputs[0].skip);
    assert_eq!(outputs[0].errors, vec!["no declaration extractor configured"]);
  }
}
