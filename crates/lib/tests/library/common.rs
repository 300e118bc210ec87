//! Shared helpers for library integration tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A throwaway project directory.
pub struct Project {
  pub temp: TempDir,
}

impl Project {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn path(&self, rel: &str) -> PathBuf {
    self.temp.path().join(rel)
  }

  /// Write a file relative to the project root.
  pub fn write(&self, rel: &str, content: &str) -> &Self {
    let path = self.path(rel);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    self
  }

  pub fn read(&self, rel: &str) -> String {
    std::fs::read_to_string(self.path(rel)).unwrap_or_else(|e| panic!("failed to read {}: {}", rel, e))
  }
}
