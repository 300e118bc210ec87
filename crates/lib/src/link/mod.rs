//! Cross-package import linking.
//!
//! Runs over already-written library output trees of a multi-package build
//! and rewrites module specifiers that cross a package boundary:
//!
//! - a specifier into the importing library's own sources becomes a relative
//!   path inside its output tree
//! - a specifier into another declared library becomes that library's package
//!   name
//! - a specifier to a local file outside every library is copied into the
//!   library's side directory and relinked recursively
//!
//! Only specifiers starting with the alias prefix or `../` are considered.
//! Inlined regions are skipped by the scanner, and specifiers that already
//! resolve inside the output tree are left alone, so linking an already
//! linked tree modifies nothing.

pub(crate) mod paths;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::RawLibrary;
use crate::consts::{DEFAULT_ALIAS_PREFIX, DEFAULT_SIDE_DIR};
use crate::rewrite::{Replacement, apply_replacements};
use crate::scan::find_specifiers;
use crate::transform::types::full_extension;

use paths::{exists_in_output, is_declaration_file, is_linkable, normalize, output_form, resolve_local, specifier_to};

/// Errors that abort linking.
#[derive(Debug, Error)]
pub enum LinkError {
  /// An alias specifier names a file that does not exist.
  #[error("cannot resolve {specifier:?} imported from {importer}")]
  UnresolvedAlias { specifier: String, importer: PathBuf },

  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk output directory: {message}")]
  Walk { message: String },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> LinkError + '_ {
  move |source| LinkError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// One sibling package of a multi-package build. All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDescriptor {
  pub package_name: String,
  pub main_file: PathBuf,
  pub source_dir: PathBuf,
  pub out_dir: PathBuf,
}

impl LibraryDescriptor {
  /// Resolve a configured library against `root`. Without an explicit
  /// `outDir` the library is written to `<out_root>/<last segment of sourceDir>`.
  pub fn from_raw(raw: &RawLibrary, root: &Path, out_root: &Path) -> Self {
    let source_dir = normalize(&root.join(&raw.source_dir));
    let out_dir = match &raw.out_dir {
      Some(dir) => normalize(&root.join(dir)),
      None => {
        let segment = source_dir.file_name().map(PathBuf::from).unwrap_or_default();
        normalize(&out_root.join(segment))
      }
    };
    Self {
      package_name: raw.package_name.clone(),
      main_file: normalize(&root.join(&raw.main_file)),
      source_dir,
      out_dir,
    }
  }

  /// Directory holding the main file.
  pub fn entry_dir(&self) -> &Path {
    self.main_file.parent().unwrap_or(&self.source_dir)
  }
}

#[derive(Debug, Clone)]
pub struct LinkOptions {
  pub root_dir: PathBuf,
  pub alias_prefix: String,
  pub libraries: Vec<LibraryDescriptor>,
  /// Name of the per-library directory receiving copied files.
  pub side_dir: String,
}

impl LinkOptions {
  pub fn new(root_dir: impl Into<PathBuf>, libraries: Vec<LibraryDescriptor>) -> Self {
    Self {
      root_dir: root_dir.into(),
      alias_prefix: DEFAULT_ALIAS_PREFIX.to_string(),
      libraries,
      side_dir: DEFAULT_SIDE_DIR.to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkResult {
  /// Files whose contents were rewritten.
  pub modified: Vec<PathBuf>,
  /// Files copied into side directories.
  pub copied: Vec<PathBuf>,
  pub warnings: Vec<String>,
}

/// Link every library's output tree.
pub fn link(options: &LinkOptions) -> Result<LinkResult, LinkError> {
  let mut pass = LinkPass {
    options,
    copies: HashMap::new(),
    owners: HashMap::new(),
    result: LinkResult::default(),
  };
  pass.run()?;

  info!(
    modified = pass.result.modified.len(),
    copied = pass.result.copied.len(),
    warnings = pass.result.warnings.len(),
    "linking complete"
  );
  Ok(pass.result)
}

struct LinkPass<'a> {
  options: &'a LinkOptions,
  /// Canonical source path -> its copy in the current library's side directory.
  copies: HashMap<PathBuf, PathBuf>,
  /// Side-directory path -> the canonical source it holds.
  owners: HashMap<PathBuf, PathBuf>,
  result: LinkResult,
}

/// Where an output file came from.
struct Origin<'p> {
  /// Source-space directory its relative specifiers are resolved against.
  source_dir: &'p Path,
  /// The file was copied from outside the library; `./` specifiers no longer
  /// hold after flattening into the side directory.
  external: bool,
}

impl<'a> LinkPass<'a> {
  fn run(&mut self) -> Result<(), LinkError> {
    let options = self.options;
    for library in &options.libraries {
      if !library.out_dir.is_dir() {
        debug!(library = %library.package_name, out_dir = %library.out_dir.display(), "no output to link");
        continue;
      }
      info!(library = %library.package_name, out_dir = %library.out_dir.display(), "linking library");
      self.copies.clear();
      self.owners.clear();

      for file in self.library_files(library)? {
        let rel = file.strip_prefix(&library.out_dir).unwrap_or(&file);
        let source_file = library.source_dir.join(rel);
        let source_dir = source_file.parent().unwrap_or(&library.source_dir);
        let origin = Origin {
          source_dir,
          external: false,
        };
        self.link_file(library, &file, &origin)?;
      }
    }
    Ok(())
  }

  /// Linkable files of a library's output tree, side directory excluded.
  fn library_files(&self, library: &LibraryDescriptor) -> Result<Vec<PathBuf>, LinkError> {
    let side_dir = self.options.side_dir.as_str();
    let walker = WalkDir::new(&library.out_dir)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| !(e.depth() == 1 && e.file_type().is_dir() && e.file_name() == side_dir));

    let mut files = Vec::new();
    for entry in walker {
      let entry = entry.map_err(|e| LinkError::Walk { message: e.to_string() })?;
      if entry.file_type().is_file() && is_linkable(entry.path()) {
        files.push(entry.into_path());
      }
    }
    Ok(files)
  }

  fn link_file(&mut self, library: &'a LibraryDescriptor, path: &Path, origin: &Origin) -> Result<(), LinkError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::InvalidData => return Ok(()),
      Err(e) => return Err(io_error(path)(e)),
    };

    let mut replacements = Vec::new();
    for specifier in find_specifiers(&content) {
      if let Some(rewritten) = self.rewrite(library, path, origin, &specifier.value)?
        && rewritten != specifier.value
      {
        debug!(file = %path.display(), from = %specifier.value, to = %rewritten, "rewriting specifier");
        replacements.push(Replacement::new(specifier.start, specifier.end, rewritten));
      }
    }

    if replacements.is_empty() {
      return Ok(());
    }
    let updated = apply_replacements(&content, replacements);
    if updated == content {
      return Ok(());
    }
    fs::write(path, updated).map_err(io_error(path))?;
    self.result.modified.push(path.to_path_buf());
    Ok(())
  }

  /// The replacement for one specifier, or `None` to leave it alone.
  fn rewrite(
    &mut self,
    library: &'a LibraryDescriptor,
    importer: &Path,
    origin: &Origin,
    value: &str,
  ) -> Result<Option<String>, LinkError> {
    let alias = value.strip_prefix(self.options.alias_prefix.as_str());
    let relative = value.starts_with("../") || (origin.external && value.starts_with("./"));
    if alias.is_none() && !relative {
      return Ok(None);
    }

    let out_parent = importer.parent().unwrap_or(&library.out_dir);
    if alias.is_none() && exists_in_output(out_parent, value, &library.out_dir) {
      return Ok(None);
    }

    let target = match alias {
      Some(rest) => normalize(&self.options.root_dir.join(rest)),
      None => normalize(&origin.source_dir.join(value)),
    };

    if let Ok(rel) = target.strip_prefix(&library.source_dir) {
      let out_target = output_form(&library.out_dir.join(rel));
      return Ok(Some(specifier_to(value, out_parent, &out_target)));
    }

    // membership in a declared library wins over copying
    if let Some(other) = self
      .options
      .libraries
      .iter()
      .find(|l| l.package_name != library.package_name && target.starts_with(&l.source_dir))
    {
      return Ok(Some(other.package_name.clone()));
    }

    let Some(resolved) = resolve_local(&target, is_declaration_file(importer)) else {
      if alias.is_some() {
        return Err(LinkError::UnresolvedAlias {
          specifier: value.to_string(),
          importer: importer.to_path_buf(),
        });
      }
      warn!(file = %importer.display(), specifier = value, "unresolved relative import");
      self
        .result
        .warnings
        .push(format!("{}: unresolved import {:?}", importer.display(), value));
      return Ok(None);
    };

    if resolved.starts_with(library.entry_dir()) {
      return Ok(None);
    }

    let canonical = dunce::canonicalize(&resolved).map_err(io_error(&resolved))?;
    if let Some(dest) = self.copies.get(&canonical) {
      return Ok(Some(specifier_to(value, out_parent, dest)));
    }

    let side_dir = library.out_dir.join(&self.options.side_dir);
    let dest = self.claim_side_path(&side_dir, &resolved, &canonical);
    // record before descending so cycles terminate
    self.copies.insert(canonical, dest.clone());

    fs::create_dir_all(&side_dir).map_err(io_error(&side_dir))?;
    fs::copy(&resolved, &dest).map_err(io_error(&dest))?;
    debug!(from = %resolved.display(), to = %dest.display(), "copied external file");
    self.result.copied.push(dest.clone());

    let source_dir = resolved.parent().unwrap_or(&self.options.root_dir).to_path_buf();
    let origin = Origin {
      source_dir: &source_dir,
      external: true,
    };
    self.link_file(library, &dest, &origin)?;

    Ok(Some(specifier_to(value, out_parent, &dest)))
  }

  /// A side-directory path for `source` no other source holds. Later sources
  /// that flatten to a taken name get a numeric suffix: `utils_h_2.ts`.
  fn claim_side_path(&mut self, side_dir: &Path, source: &Path, canonical: &Path) -> PathBuf {
    let name = side_name(source);
    let (stem, ext) = name.split_at(name.len() - full_extension(&name).len());

    let mut dest = side_dir.join(&name);
    let mut n = 2;
    while self.owners.contains_key(&dest) {
      dest = side_dir.join(format!("{}_{}{}", stem, n, ext));
      n += 1;
    }
    self.owners.insert(dest.clone(), canonical.to_path_buf());
    dest
  }
}

/// Flattened side-directory name: `<parent dir>_<file name>`.
fn side_name(path: &Path) -> String {
  let file = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
  match path.parent().and_then(|p| p.file_name()) {
    Some(parent) => format!("{}_{}", parent.to_string_lossy(), file),
    None => file.to_string(),
  }
}
