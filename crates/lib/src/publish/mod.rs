//! Publishing built packages to their registries.
//!
//! The registry protocols themselves are left to the registries' own command
//! line tools; [`CommandPublisher`] runs them inside the package directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Registry;
use crate::package::writer_for;

#[derive(Debug, Error)]
pub enum PublishError {
  #[error("{dir} has no {file}; build with the {registry} registry enabled first")]
  MissingManifest {
    dir: PathBuf,
    file: &'static str,
    registry: Registry,
  },

  #[error("failed to run `{command}`: {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },

  #[error("`{command}` exited with {}", code.map_or("a signal".to_string(), |c| format!("code {}", c)))]
  Failed { command: String, code: Option<i32> },
}

/// Publishes one built package directory.
#[async_trait]
pub trait Publisher: Send + Sync {
  async fn publish(&self, dir: &Path, registry: Registry) -> Result<(), PublishError>;
}

/// Runs the registry's CLI (`npm publish`, `npx jsr publish`).
#[derive(Debug, Clone)]
pub struct CommandPublisher {
  pub dry_run: bool,
  npm: Vec<String>,
  jsr: Vec<String>,
}

impl CommandPublisher {
  pub fn new(dry_run: bool) -> Self {
    Self {
      dry_run,
      npm: vec!["npm".to_string(), "publish".to_string()],
      jsr: vec!["npx".to_string(), "jsr".to_string(), "publish".to_string()],
    }
  }

  /// Replace the command line used for `registry`.
  pub fn with_command(mut self, registry: Registry, argv: Vec<String>) -> Self {
    match registry {
      Registry::Npm => self.npm = argv,
      Registry::Jsr => self.jsr = argv,
    }
    self
  }

  /// Full argument vector for `registry`, dry-run flag included.
  pub fn command(&self, registry: Registry) -> Vec<String> {
    let mut argv = match registry {
      Registry::Npm => self.npm.clone(),
      Registry::Jsr => self.jsr.clone(),
    };
    if self.dry_run {
      argv.push("--dry-run".to_string());
    }
    argv
  }
}

#[async_trait]
impl Publisher for CommandPublisher {
  async fn publish(&self, dir: &Path, registry: Registry) -> Result<(), PublishError> {
    let file = writer_for(registry).file_name();
    if !dir.join(file).is_file() {
      return Err(PublishError::MissingManifest {
        dir: dir.to_path_buf(),
        file,
        registry,
      });
    }

    let argv = self.command(registry);
    let display = argv.join(" ");
    let Some((program, args)) = argv.split_first() else {
      return Err(PublishError::Failed {
        command: display,
        code: None,
      });
    };

    info!(registry = %registry, dir = %dir.display(), dry_run = self.dry_run, "publishing");
    let output = Command::new(program)
      .args(args)
      .current_dir(dir)
      .output()
      .await
      .map_err(|source| PublishError::Spawn {
        command: display.clone(),
        source,
      })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
      debug!(stdout = %stdout.trim(), "publish output");
    }
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if !stderr.is_empty() {
        debug!(stderr = %stderr, "publish stderr");
      }
      return Err(PublishError::Failed {
        command: display,
        code: output.status.code(),
      });
    }

    info!(registry = %registry, "published");
    Ok(())
  }
}
