//! Configuration types.
//!
//! Every layer (preset, project file, invocation overrides) deserializes into a
//! [`PartialConfig`]. All fields are optional so a layer only states what it
//! overrides. Unknown keys are rejected at parse time.

use serde::{Deserialize, Serialize};

/// Strategy used to build one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuilderKind {
  /// Transform a single source file.
  Transform,
  /// Transform a whole directory, mirroring its layout.
  Mirror,
  /// Emit declaration files only.
  SpecGenerate,
  /// Copy files verbatim.
  Copy,
  /// Hand the entry to a registered bundle backend.
  PluginBundle,
}

impl std::fmt::Display for BuilderKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      BuilderKind::Transform => "transform",
      BuilderKind::Mirror => "mirror",
      BuilderKind::SpecGenerate => "spec-generate",
      BuilderKind::Copy => "copy",
      BuilderKind::PluginBundle => "plugin-bundle",
    };
    write!(f, "{}", name)
  }
}

/// Module-linking convention of emitted code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
  /// Static `import`/`export`.
  #[default]
  Esm,
  /// `require`/`module.exports`.
  Cjs,
}

/// Target registry of a produced package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
  Npm,
  Jsr,
}

impl std::fmt::Display for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Registry::Npm => write!(f, "npm"),
      Registry::Jsr => write!(f, "jsr"),
    }
  }
}

/// An entry as written in configuration, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawEntry {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub out_dir: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub builder: Option<BuilderKind>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub declaration: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_lib: Option<bool>,
}

/// A sibling package of a multi-package build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawLibrary {
  /// Published package name, e.g. `@org/b`.
  pub package_name: String,
  /// Main file, relative to the project root.
  pub main_file: String,
  /// Source directory, relative to the project root.
  pub source_dir: String,
  /// Output directory; defaults to `<outDir>/<last segment of sourceDir>`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub out_dir: Option<String>,
}

/// Transformer sub-options of one layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialTransformConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pattern: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exclude: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub format: Option<ModuleFormat>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub esm_extension: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub declaration_extension: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub concurrency: Option<usize>,
}

/// One configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub out_dir: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entries: Option<Vec<RawEntry>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub externals: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub clean: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parallel: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fail_on_warn: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub declaration: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub transform: Option<PartialTransformConfig>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub libraries: Option<Vec<RawLibrary>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub alias_prefix: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub side_dir: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub registries: Option<Vec<Registry>>,
}

/// Fully resolved transformer options.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
  pub pattern: String,
  pub exclude: Vec<String>,
  pub format: ModuleFormat,
  pub esm_extension: String,
  pub declaration_extension: String,
  pub concurrency: usize,
}

/// The merged configuration with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
  pub out_dir: String,
  pub entries: Vec<RawEntry>,
  pub externals: Vec<String>,
  pub clean: bool,
  pub parallel: bool,
  pub fail_on_warn: bool,
  pub declaration: bool,
  pub transform: TransformConfig,
  pub libraries: Vec<RawLibrary>,
  pub alias_prefix: String,
  pub side_dir: String,
  pub registries: Vec<Registry>,
}
