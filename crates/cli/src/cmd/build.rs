//! Implementation of the `twinpack build` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use twinpack_lib::build::{BuildManifest, BuildReport, Builder};
use twinpack_lib::config::ConfigLayers;
use twinpack_lib::transform::FileError;

use crate::output::{
  Level, OutputFormat, format_bytes, format_duration, print_diagnostics, print_json, print_manifest, stat, status,
};

use super::{BuildArgs, runtime};

pub fn cmd_build(args: &BuildArgs, output: OutputFormat) -> Result<()> {
  let root = args.root()?;
  let report = run_build(&root, args.stub, args.layers(&root)?)?;

  if output.is_json() {
    print_json(&JsonReport {
      manifest: &report.manifest,
      warnings: &report.warnings,
      errors: &report.errors,
    })?;
  } else {
    print_report(&report, args.stub);
  }
  Ok(())
}

/// The `--output json` document.
#[derive(Serialize)]
struct JsonReport<'a> {
  manifest: &'a BuildManifest,
  warnings: &'a [String],
  errors: &'a [FileError],
}

/// Build the project at `root` and print its warnings and per-file errors.
pub(super) fn run_build(root: &Path, stub: bool, layers: ConfigLayers) -> Result<BuildReport> {
  let rt = runtime()?;
  let report = rt
    .block_on(Builder::new().build(root, stub, layers))
    .context("Build failed")?;

  print_diagnostics(&report.warnings, &report.errors);
  Ok(report)
}

fn print_report(report: &BuildReport, stub: bool) {
  println!();
  status(Level::Done, if stub { "Stubs written!" } else { "Build complete!" });
  print_manifest(&report.manifest);
  println!();

  stat("Files", report.manifest.entries.len());
  stat("Total size", format_bytes(report.manifest.total_bytes()));
  if !report.errors.is_empty() {
    stat("Failed files", report.errors.len());
  }
  if !report.linked.is_empty() {
    stat("Linked", report.linked.len());
  }
  for path in &report.registry_manifests {
    stat("Manifest", path.display());
  }
  stat("Duration", format_duration(report.duration));
}
