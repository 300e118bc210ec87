mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, RegistryArg};
use output::{Level, OutputFormat, status};

/// twinpack - build and publish packages for npm and JSR
#[derive(Parser)]
#[command(name = "twinpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the package in a project directory
  Build {
    #[command(flatten)]
    args: BuildArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Rewrite cross-library imports in already built library trees
  Link {
    /// Project directory (default: current directory)
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Preset configuration file merged below the project file
    #[arg(long)]
    preset: Option<PathBuf>,
  },

  /// Build, then publish the output directory to each registry
  Publish {
    #[command(flatten)]
    args: BuildArgs,

    /// Registries to publish to (default: the configured registries)
    #[arg(long = "to", value_enum)]
    to: Vec<RegistryArg>,

    /// Run the registry tools with --dry-run
    #[arg(long)]
    dry_run: bool,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(e) = run(cli) {
    status(Level::Error, &format!("{:#}", e));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::Build { args, output } => cmd::cmd_build(&args, output),
    Commands::Link { dir, preset } => cmd::cmd_link(&dir, preset.as_deref()),
    Commands::Publish { args, to, dry_run } => cmd::cmd_publish(&args, &to, dry_run),
  }
}
