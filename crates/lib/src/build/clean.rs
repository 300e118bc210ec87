//! Output directory cleaning.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::BuildError;

/// Directories to remove before a build.
///
/// Duplicates are dropped, as is any directory that is the root or one of its
/// ancestors, and any directory inside one already selected.
pub fn clean_targets<'a>(root: &Path, dirs: impl IntoIterator<Item = &'a Path>) -> Vec<PathBuf> {
  let mut candidates: Vec<&Path> = dirs.into_iter().collect();
  // ancestors sort before their descendants
  candidates.sort_by_key(|d| d.components().count());

  let mut selected: Vec<PathBuf> = Vec::new();
  for dir in candidates {
    if root.starts_with(dir) {
      debug!(dir = %dir.display(), "not cleaning an ancestor of the project root");
      continue;
    }
    if selected.iter().any(|s| dir.starts_with(s)) {
      continue;
    }
    selected.push(dir.to_path_buf());
  }
  selected
}

/// Remove each target recursively; missing directories are fine.
pub async fn clean_dirs(targets: &[PathBuf]) -> Result<(), BuildError> {
  for dir in targets {
    match tokio::fs::remove_dir_all(dir).await {
      Ok(()) => info!(dir = %dir.display(), "cleaned output directory"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(BuildError::io(dir)(e)),
    }
  }
  Ok(())
}
