//! Implementation of the `twinpack link` command.
//!
//! Runs the cross-library linker alone, over trees an earlier build wrote.

use std::path::Path;

use anyhow::{Context, Result, bail};

use twinpack_lib::build::BuildOptions;
use twinpack_lib::config::{ConfigLayers, PartialConfig};
use twinpack_lib::link::{LinkOptions, link};

use crate::output::{Level, print_diagnostics, stat, status};

pub fn cmd_link(dir: &Path, preset: Option<&Path>) -> Result<()> {
  let root = dunce::canonicalize(dir).with_context(|| format!("Project directory not found: {}", dir.display()))?;
  let config = ConfigLayers::discover(&root, preset, PartialConfig::default())
    .context("Failed to load configuration")?
    .resolve();
  let options = BuildOptions::from_config(&root, false, &config)?;

  if options.libraries.is_empty() {
    bail!("No libraries configured in {}", root.display());
  }

  let mut link_options = LinkOptions::new(&root, options.libraries);
  link_options.alias_prefix = options.alias_prefix;
  link_options.side_dir = options.side_dir;

  let result = link(&link_options).context("Link failed")?;
  print_diagnostics(&result.warnings, &[]);

  println!();
  if result.modified.is_empty() {
    status(Level::Note, "Nothing to link");
  } else {
    status(Level::Done, "Link complete!");
  }
  stat("Files rewritten", result.modified.len());
  stat("Files copied", result.copied.len());
  Ok(())
}
