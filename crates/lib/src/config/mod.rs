//! Layered build configuration.
//!
//! Layers are merged right-biased, field by field: `preset < project < overrides`.
//! Nested transformer options merge per field; lists are replaced wholesale by
//! the later layer. Unset fields fall back to the defaults in
//! [`ConfigLayers::resolve`].
//!
//! # Project file
//!
//! ```json
//! {
//!   "outDir": "dist",
//!   "entries": [{ "input": "src/", "declaration": true }],
//!   "failOnWarn": true,
//!   "transform": { "format": "esm", "esmExtension": ".mjs" },
//!   "libraries": [
//!     { "packageName": "@org/b", "mainFile": "libs/b/mod.ts", "sourceDir": "libs/b" }
//!   ],
//!   "registries": ["npm", "jsr"]
//! }
//! ```

mod types;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::{
  CONFIG_FILENAME, DEFAULT_ALIAS_PREFIX, DEFAULT_FILE_CONCURRENCY, DEFAULT_OUT_DIR, DEFAULT_PATTERN, DEFAULT_SIDE_DIR,
};

pub use types::{
  BuilderKind, ModuleFormat, PartialConfig, PartialTransformConfig, RawEntry, RawLibrary, Registry, ResolvedConfig,
  TransformConfig,
};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Failed to read a configuration file.
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// A configuration file is not valid (malformed JSON or unknown keys).
  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

fn pick<T>(base: Option<T>, over: Option<T>) -> Option<T> {
  over.or(base)
}

impl PartialTransformConfig {
  /// Merge `over` on top of `self`.
  pub fn merge(self, over: PartialTransformConfig) -> PartialTransformConfig {
    PartialTransformConfig {
      pattern: pick(self.pattern, over.pattern),
      exclude: pick(self.exclude, over.exclude),
      format: pick(self.format, over.format),
      esm_extension: pick(self.esm_extension, over.esm_extension),
      declaration_extension: pick(self.declaration_extension, over.declaration_extension),
      concurrency: pick(self.concurrency, over.concurrency),
    }
  }
}

impl PartialConfig {
  /// Parse a layer from JSON text. `origin` is only used in error messages.
  pub fn from_json_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
    serde_json::from_str(content).map_err(|source| ConfigError::Parse {
      path: origin.to_path_buf(),
      source,
    })
  }

  /// Load a layer from a file.
  ///
  /// Returns `Ok(None)` if the file doesn't exist.
  pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };
    debug!(path = %path.display(), "loaded config layer");
    Self::from_json_str(&content, path).map(Some)
  }

  /// Merge `over` on top of `self`; every field set in `over` wins.
  pub fn merge(self, over: PartialConfig) -> PartialConfig {
    let transform = match (self.transform, over.transform) {
      (Some(base), Some(over)) => Some(base.merge(over)),
      (base, over) => over.or(base),
    };

    PartialConfig {
      out_dir: pick(self.out_dir, over.out_dir),
      entries: pick(self.entries, over.entries),
      externals: pick(self.externals, over.externals),
      clean: pick(self.clean, over.clean),
      parallel: pick(self.parallel, over.parallel),
      fail_on_warn: pick(self.fail_on_warn, over.fail_on_warn),
      declaration: pick(self.declaration, over.declaration),
      transform,
      libraries: pick(self.libraries, over.libraries),
      alias_prefix: pick(self.alias_prefix, over.alias_prefix),
      side_dir: pick(self.side_dir, over.side_dir),
      registries: pick(self.registries, over.registries),
    }
  }
}

/// Declarations follow the code extension: `.mjs` code gets `.d.mts`.
fn declaration_extension_for(esm_extension: &str) -> String {
  match esm_extension {
    ".mjs" => ".d.mts".to_string(),
    _ => ".d.ts".to_string(),
  }
}

/// The three configuration layers of one build invocation.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
  pub preset: PartialConfig,
  pub project: PartialConfig,
  pub overrides: PartialConfig,
}

impl ConfigLayers {
  /// Build layers from an optional preset file, the project file at
  /// `root/twinpack.json` (if present), and the given overrides.
  pub fn discover(root: &Path, preset: Option<&Path>, overrides: PartialConfig) -> Result<Self, ConfigError> {
    let preset = match preset {
      Some(path) => PartialConfig::load(path)?.ok_or_else(|| ConfigError::Read {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::NotFound, "preset not found"),
      })?,
      None => PartialConfig::default(),
    };
    let project = PartialConfig::load(&root.join(CONFIG_FILENAME))?.unwrap_or_default();

    Ok(Self {
      preset,
      project,
      overrides,
    })
  }

  /// Merge all layers and apply defaults.
  pub fn resolve(self) -> ResolvedConfig {
    let merged = self.preset.merge(self.project).merge(self.overrides);
    let transform = merged.transform.unwrap_or_default();
    let esm_extension = transform.esm_extension.unwrap_or_else(|| ".mjs".to_string());

    ResolvedConfig {
      out_dir: merged.out_dir.unwrap_or_else(|| DEFAULT_OUT_DIR.to_string()),
      entries: merged.entries.unwrap_or_else(|| {
        vec![RawEntry {
          input: Some("src/".to_string()),
          ..RawEntry::default()
        }]
      }),
      externals: merged.externals.unwrap_or_default(),
      clean: merged.clean.unwrap_or(true),
      parallel: merged.parallel.unwrap_or(false),
      fail_on_warn: merged.fail_on_warn.unwrap_or(true),
      declaration: merged.declaration.unwrap_or(false),
      transform: TransformConfig {
        pattern: transform.pattern.unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
        exclude: transform.exclude.unwrap_or_default(),
        format: transform.format.unwrap_or_default(),
        declaration_extension: transform
          .declaration_extension
          .unwrap_or_else(|| declaration_extension_for(&esm_extension)),
        esm_extension,
        concurrency: transform.concurrency.unwrap_or(DEFAULT_FILE_CONCURRENCY).max(1),
      },
      libraries: merged.libraries.unwrap_or_default(),
      alias_prefix: merged.alias_prefix.unwrap_or_else(|| DEFAULT_ALIAS_PREFIX.to_string()),
      side_dir: merged.side_dir.unwrap_or_else(|| DEFAULT_SIDE_DIR.to_string()),
      registries: merged.registries.unwrap_or_default(),
    }
  }
}
