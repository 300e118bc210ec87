//! The loader pipeline.
//!
//! Loaders are tried in order for each input file. A loader either declines the
//! file (`Ok(None)`, the next loader is tried) or claims it and returns zero or
//! more outputs. A file no loader claims becomes a raw copy.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ModuleFormat;

use super::types::{InputFile, OutputFile, is_declaration_path};

/// Script extensions the [`ScriptLoader`] claims.
const SCRIPT_EXTENSIONS: &[&str] = &[".ts", ".mts", ".cts", ".tsx", ".jsx", ".js", ".mjs", ".cjs"];

/// Script extensions whose sources carry types worth extracting.
const TYPED_EXTENSIONS: &[&str] = &[".ts", ".mts", ".cts", ".tsx"];

/// Errors a loader can report for one file.
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("failed to read source: {0}")]
  Read(#[from] io::Error),

  #[error("transpile failed: {0}")]
  Transpile(String),
}

/// Options every loader sees.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
  pub format: ModuleFormat,
  /// Extension of emitted ESM code (`.mjs` or `.js`).
  pub esm_extension: String,
  /// Extension of emitted declarations (`.d.ts` or `.d.mts`).
  pub declaration_extension: String,
  /// Declarations were requested.
  pub declaration: bool,
  /// Emit code outputs; false when only declarations are built.
  pub emit_code: bool,
}

impl Default for LoaderOptions {
  fn default() -> Self {
    Self {
      format: ModuleFormat::Esm,
      esm_extension: ".mjs".to_string(),
      declaration_extension: ".d.mts".to_string(),
      declaration: false,
      emit_code: true,
    }
  }
}

/// One stage of the loader pipeline.
#[async_trait]
pub trait Loader: Send + Sync {
  fn name(&self) -> &'static str;

  /// Claim `input` and return its outputs, or decline with `Ok(None)`.
  async fn load(&self, input: &InputFile, options: &LoaderOptions) -> Result<Option<Vec<OutputFile>>, LoadError>;
}

/// Turns script sources into emitted code.
///
/// Type stripping and syntax lowering are not done here; a build that feeds
/// TypeScript sources plugs in a real transpiler.
pub trait Transpiler: Send + Sync {
  fn transpile(&self, input: &InputFile, contents: &str, format: ModuleFormat) -> Result<String, String>;
}

/// Passes sources through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTranspiler;

impl Transpiler for IdentityTranspiler {
  fn transpile(&self, _input: &InputFile, contents: &str, _format: ModuleFormat) -> Result<String, String> {
    Ok(contents.to_string())
  }
}

/// Claims script sources: emits one code output and, for typed sources when
/// declarations are requested, one declaration request.
pub struct ScriptLoader {
  transpiler: Arc<dyn Transpiler>,
}

impl ScriptLoader {
  pub fn new(transpiler: Arc<dyn Transpiler>) -> Self {
    Self { transpiler }
  }

  fn code_extension(input: &InputFile, options: &LoaderOptions) -> String {
    match input.extension.as_str() {
      ".mts" | ".mjs" => ".mjs".to_string(),
      ".cts" | ".cjs" => ".cjs".to_string(),
      _ => match options.format {
        ModuleFormat::Esm => options.esm_extension.clone(),
        ModuleFormat::Cjs => ".cjs".to_string(),
      },
    }
  }

  fn declaration_extension(input: &InputFile, options: &LoaderOptions) -> String {
    match input.extension.as_str() {
      ".mts" => ".d.mts".to_string(),
      ".cts" => ".d.cts".to_string(),
      _ => options.declaration_extension.clone(),
    }
  }
}

impl Default for ScriptLoader {
  fn default() -> Self {
    Self::new(Arc::new(IdentityTranspiler))
  }
}

#[async_trait]
impl Loader for ScriptLoader {
  fn name(&self) -> &'static str {
    "script"
  }

  async fn load(&self, input: &InputFile, options: &LoaderOptions) -> Result<Option<Vec<OutputFile>>, LoadError> {
    if is_declaration_path(&input.rel_path) || !SCRIPT_EXTENSIONS.contains(&input.extension.as_str()) {
      return Ok(None);
    }

    let contents = input.contents().await?;
    let mut outputs = Vec::new();

    if options.emit_code {
      let code = self
        .transpiler
        .transpile(input, contents, options.format)
        .map_err(LoadError::Transpile)?;
      outputs.push(OutputFile::code(input, code, Self::code_extension(input, options)));
    }

    if options.declaration && TYPED_EXTENSIONS.contains(&input.extension.as_str()) {
      outputs.push(OutputFile::declaration_request(
        input,
        contents.to_string(),
        Self::declaration_extension(input, options),
      ));
    }

    Ok(Some(outputs))
  }
}

/// Passes hand-written declaration files through when declarations are built.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclarationFileLoader;

#[async_trait]
impl Loader for DeclarationFileLoader {
  fn name(&self) -> &'static str {
    "declaration-file"
  }

  async fn load(&self, input: &InputFile, options: &LoaderOptions) -> Result<Option<Vec<OutputFile>>, LoadError> {
    if !options.declaration || !is_declaration_path(&input.rel_path) {
      return Ok(None);
    }
    let contents = input.contents().await?;
    Ok(Some(vec![OutputFile::declaration(input, contents.to_string())]))
  }
}

/// The built-in pipeline: declaration files first, then scripts.
pub fn default_loaders() -> Vec<Arc<dyn Loader>> {
  vec![Arc::new(DeclarationFileLoader), Arc::new(ScriptLoader::default())]
}

/// Run `loaders` over `input`.
///
/// Returns `None` when no loader claimed the file.
pub async fn run_loaders(
  loaders: &[Arc<dyn Loader>],
  input: &InputFile,
  options: &LoaderOptions,
) -> Result<Option<Vec<OutputFile>>, LoadError> {
  for loader in loaders {
    if let Some(outputs) = loader.load(input, options).await? {
      tracing::trace!(loader = loader.name(), file = %input.rel_path, outputs = outputs.len(), "loader claimed file");
      return Ok(Some(outputs));
    }
  }
  Ok(None)
}
