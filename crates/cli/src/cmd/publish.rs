//! Implementation of the `twinpack publish` command.

use anyhow::{Context, Result, bail};

use twinpack_lib::build::BuildOptions;
use twinpack_lib::config::Registry;
use twinpack_lib::publish::{CommandPublisher, Publisher};

use crate::output::{Level, status};

use super::build::run_build;
use super::{BuildArgs, RegistryArg, runtime};

pub fn cmd_publish(args: &BuildArgs, to: &[RegistryArg], dry_run: bool) -> Result<()> {
  if args.stub {
    bail!("Refusing to publish stub output");
  }

  let root = args.root()?;
  let mut layers = args.layers(&root)?;
  let mut registries: Vec<Registry> = to.iter().map(|r| (*r).into()).collect();
  if registries.is_empty() {
    registries = layers.clone().resolve().registries;
  }
  if registries.is_empty() {
    bail!("No registry selected; pass --to or configure registries");
  }

  // every target registry needs its manifest in the output
  layers.overrides.registries = Some(registries.clone());
  let config = layers.clone().resolve();
  let out_dir = BuildOptions::from_config(&root, false, &config)?.out_dir;

  run_build(&root, false, layers)?;

  let publisher = CommandPublisher::new(dry_run);
  let rt = runtime()?;
  for registry in registries {
    status(Level::Note, &format!("Publishing {} to {}", out_dir.display(), registry));
    rt.block_on(publisher.publish(&out_dir, registry))
      .with_context(|| format!("Publish to {} failed", registry))?;
  }

  println!();
  if dry_run {
    status(Level::Note, "Dry run - nothing was uploaded");
  } else {
    status(Level::Done, "Publish complete!");
  }
  Ok(())
}
