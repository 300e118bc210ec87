//! Terminal rendering of build, link and publish results.
//!
//! Every status line starts with the marker of its [`Level`]. Dependency
//! warnings and per-file errors never share a marker, so a report can always
//! tell them apart.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use twinpack_lib::build::BuildManifest;
use twinpack_lib::transform::FileError;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
  Done,
  Note,
  Warning,
  Error,
}

impl Level {
  pub fn marker(self) -> &'static str {
    match self {
      Level::Done => "✓",
      Level::Note => "•",
      Level::Warning => "⚠",
      Level::Error => "✗",
    }
  }
}

/// Print one status line. Warnings and errors go to stderr.
pub fn status(level: Level, message: &str) {
  let marker = level.marker();
  match level {
    Level::Done => println!("{} {}", marker.if_supports_color(Stream::Stdout, |s| s.green()), message),
    Level::Note => println!("{} {}", marker.if_supports_color(Stream::Stdout, |s| s.blue()), message),
    Level::Warning => eprintln!(
      "{} {}",
      marker.if_supports_color(Stream::Stderr, |s| s.yellow()),
      message.if_supports_color(Stream::Stderr, |s| s.yellow())
    ),
    Level::Error => eprintln!(
      "{} {}",
      marker.if_supports_color(Stream::Stderr, |s| s.red()),
      message.if_supports_color(Stream::Stderr, |s| s.red())
    ),
  }
}

pub fn stat(label: &str, value: impl std::fmt::Display) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_diagnostics(warnings: &[String], errors: &[FileError]) {
  for warning in warnings {
    status(Level::Warning, warning);
  }
  for error in errors {
    status(Level::Error, &error.to_string());
  }
}

/// One line per produced file: `→` for named entries, `•` for chunks.
pub fn print_manifest(manifest: &BuildManifest) {
  for entry in &manifest.entries {
    let marker = if entry.chunk {
      Level::Note.marker()
    } else {
      "→"
    };
    println!("  {} {} ({})", marker, entry.path, format_bytes(entry.bytes));
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
  println!("{}", json);
  Ok(())
}

/// Output sizes: bundles stay well below gigabytes.
pub fn format_bytes(bytes: u64) -> String {
  match bytes {
    b if b >= 1 << 20 => format!("{:.1} MB", b as f64 / (1u64 << 20) as f64),
    b if b >= 1 << 10 => format!("{:.1} KB", b as f64 / (1u64 << 10) as f64),
    b => format!("{} B", b),
  }
}

pub fn format_duration(duration: Duration) -> String {
  if duration.as_secs() > 0 {
    format!("{:.2}s", duration.as_secs_f64())
  } else {
    format!("{}ms", duration.as_millis())
  }
}
