use std::collections::BTreeSet;

use tracing::warn;

use crate::package::PackageJson;
use crate::transform::FileError;

use super::types::{BuildManifest, BuildOptions};

/// State of one build invocation, threaded through every step and hook.
#[derive(Debug, Clone)]
pub struct BuildContext {
  pub options: BuildOptions,
  pub package: PackageJson,
  /// Module names left to the installer instead of being built.
  pub externals: BTreeSet<String>,
  pub manifest: BuildManifest,
  pub errors: Vec<FileError>,
  warnings: Vec<String>,
}

impl BuildContext {
  pub fn new(options: BuildOptions, package: PackageJson) -> Self {
    Self {
      options,
      package,
      externals: BTreeSet::new(),
      manifest: BuildManifest::default(),
      errors: Vec::new(),
      warnings: Vec::new(),
    }
  }

  /// Record a warning once.
  pub fn warn(&mut self, message: impl Into<String>) {
    let message = message.into();
    if !self.warnings.contains(&message) {
      warn!("{}", message);
      self.warnings.push(message);
    }
  }

  pub fn warnings(&self) -> &[String] {
    &self.warnings
  }
}
