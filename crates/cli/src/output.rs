//! CLI output formatting utilities.
//!
//! Status lines go to stdout and errors to stderr, so `-o json` keeps stdout
//! machine-readable. Colors are only used when the stream supports them.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

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

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
}

const HASH_PREFIX_LEN: usize = 12;

/// Leading characters of a hex digest, enough to tell packages apart.
pub fn truncate_hash(hash: &str) -> &str {
  hash.get(..HASH_PREFIX_LEN).unwrap_or(hash)
}

/// Package and archive sizes in binary units.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 2] = ["KB", "MB"];

  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = UNITS[0];
  for next in &UNITS[1..] {
    if value < 1024.0 {
      break;
    }
    value /= 1024.0;
    unit = *next;
  }
  format!("{:.1} {}", value, unit)
}

pub fn format_duration(duration: Duration) -> String {
  match duration.as_secs() {
    0 => format!("{}ms", duration.subsec_millis()),
    secs => format!("{}.{:02}s", secs, duration.subsec_millis() / 10),
  }
}

/// Split orchestrator messages into the phases that succeeded and the failure.
///
/// A failed run reports its failure last.
pub fn split_outcome(messages: &[String], failed: bool) -> (&[String], Option<&String>) {
  match (failed, messages.split_last()) {
    (true, Some((last, rest))) => (rest, Some(last)),
    _ => (messages, None),
  }
}

pub fn print_success(message: &str) {
  println!("{} {}", symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()), message);
}

/// Errors go to stderr so a failed `-o json` run still leaves stdout parseable.
pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_info(message: &str) {
  println!("{} {}", symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()), message);
}

/// An indented `label: value` line under a status line.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let mut stdout = io::stdout().lock();
  serde_json::to_writer_pretty(&mut stdout, value).context("Failed to write JSON output")?;
  writeln!(stdout).context("Failed to write JSON output")?;
  Ok(())
}
