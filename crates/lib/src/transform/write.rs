//! The write pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::FileError;
use super::types::OutputFile;

/// Write every non-skipped output under `dist` with at most `concurrency`
/// files in flight.
///
/// Returns `(index into outputs, written path, bytes)` for each success and a
/// [`FileError`] for each failure; one failure never stops sibling writes.
pub async fn write_outputs(
  outputs: &[OutputFile],
  dist: &Path,
  concurrency: usize,
) -> (Vec<(usize, PathBuf, u64)>, Vec<FileError>) {
  let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
  let mut join_set = JoinSet::new();

  for (idx, output) in outputs.iter().enumerate().filter(|(_, o)| !o.skip) {
    let dest = output.dest_path(dist);
    let src = output.src_path.clone();
    let contents = output.contents.clone();
    let raw = output.raw;
    let semaphore = semaphore.clone();

    join_set.spawn(async move {
      // the semaphore is never closed, so acquiring only waits
      let _permit = semaphore.acquire_owned().await;
      let result = write_one(&dest, &src, contents.as_deref(), raw).await;
      (idx, dest, result)
    });
  }

  let mut written = Vec::new();
  let mut errors = Vec::new();

  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((idx, dest, Ok(bytes))) => {
        debug!(path = %dest.display(), bytes, "wrote output");
        written.push((idx, dest, bytes));
      }
      Ok((_, dest, Err(e))) => {
        error!(path = %dest.display(), error = %e, "write failed");
        errors.push(FileError {
          path: dest,
          message: e.to_string(),
        });
      }
      Err(e) => {
        error!(error = %e, "write task panicked");
        errors.push(FileError {
          path: dist.to_path_buf(),
          message: e.to_string(),
        });
      }
    }
  }

  written.sort_by_key(|(idx, _, _)| *idx);
  (written, errors)
}

async fn write_one(dest: &Path, src: &Path, contents: Option<&str>, raw: bool) -> std::io::Result<u64> {
  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).await?;
  }
  match contents {
    Some(text) if !raw => {
      fs::write(dest, text).await?;
      Ok(text.len() as u64)
    }
    _ => fs::copy(src, dest).await,
  }
}
