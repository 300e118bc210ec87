mod build;
mod link;
mod publish;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use twinpack_lib::config::{ConfigLayers, PartialConfig, Registry};

pub use build::cmd_build;
pub use link::cmd_link;
pub use publish::cmd_publish;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegistryArg {
  Npm,
  Jsr,
}

impl From<RegistryArg> for Registry {
  fn from(arg: RegistryArg) -> Self {
    match arg {
      RegistryArg::Npm => Registry::Npm,
      RegistryArg::Jsr => Registry::Jsr,
    }
  }
}

/// Flags shared by `build` and `publish`. Every flag lands in the override
/// layer, above the project's `twinpack.json`.
#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Project directory (default: current directory)
  #[arg(default_value = ".")]
  pub dir: PathBuf,

  /// Preset configuration file merged below the project file
  #[arg(long)]
  pub preset: Option<PathBuf>,

  /// Output directory, relative to the project
  #[arg(long)]
  pub out_dir: Option<String>,

  /// Write stubs re-exporting the sources instead of building
  #[arg(long)]
  pub stub: bool,

  /// Run entries concurrently
  #[arg(long)]
  pub parallel: bool,

  /// Keep existing output directories
  #[arg(long)]
  pub no_clean: bool,

  /// Report warnings without failing the build
  #[arg(long)]
  pub allow_warnings: bool,

  /// Emit declaration files for every entry
  #[arg(long)]
  pub declaration: bool,

  /// Write a registry manifest (repeatable)
  #[arg(long = "registry", value_enum)]
  pub registries: Vec<RegistryArg>,
}

impl BuildArgs {
  pub fn root(&self) -> Result<PathBuf> {
    dunce::canonicalize(&self.dir).with_context(|| format!("Project directory not found: {}", self.dir.display()))
  }

  fn overrides(&self) -> PartialConfig {
    PartialConfig {
      out_dir: self.out_dir.clone(),
      parallel: self.parallel.then_some(true),
      clean: self.no_clean.then_some(false),
      fail_on_warn: self.allow_warnings.then_some(false),
      declaration: self.declaration.then_some(true),
      registries: (!self.registries.is_empty()).then(|| self.registries.iter().map(|r| (*r).into()).collect()),
      ..Default::default()
    }
  }

  pub fn layers(&self, root: &Path) -> Result<ConfigLayers> {
    ConfigLayers::discover(root, self.preset.as_deref(), self.overrides()).context("Failed to load configuration")
  }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
