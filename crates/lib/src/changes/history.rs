//! Release history.
//!
//! The history file is plain text, newest release first:
//!
//! ```text
//!  * change not yet released
//! release date=14:05 19.10.2026,version=1.0.1,distribution=stable,urgency=low,by=Jane <j@example.org>
//!  * fixed the frobnicator
//! ```
//!
//! Change lines above the first `release` header are pending: they become the
//! change list of the next recorded release.

use std::io::{self, Write};

use chrono::NaiveDateTime;
use thiserror::Error;

const RELEASE_PREFIX: &str = "release ";
const DATE_FORMAT: &str = "%H:%M %d.%m.%Y";

#[derive(Debug, Error)]
pub enum HistoryError {
  #[error("invalid release history at line {line}: {message}")]
  Parse { line: usize, message: String },

  #[error("failed to write release history: {0}")]
  Write(#[source] io::Error),
}

/// One released version and the changes it shipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEntry {
  pub date: Option<NaiveDateTime>,
  pub version: String,
  pub distribution: Option<String>,
  pub urgency: Option<String>,
  pub changed_by: Option<String>,
  /// Header keys this crate does not interpret, kept in order.
  pub extra: Vec<(String, String)>,
  pub changes: Vec<String>,
}

impl ReleaseEntry {
  pub fn new(version: impl Into<String>) -> Self {
    Self {
      date: None,
      version: version.into(),
      distribution: None,
      urgency: None,
      changed_by: None,
      extra: Vec::new(),
      changes: Vec::new(),
    }
  }

  fn header(&self) -> String {
    let mut parts = Vec::new();
    if let Some(date) = self.date {
      parts.push(format!("date={}", date.format(DATE_FORMAT)));
    }
    parts.push(format!("version={}", self.version));
    if let Some(distribution) = &self.distribution {
      parts.push(format!("distribution={}", distribution));
    }
    if let Some(urgency) = &self.urgency {
      parts.push(format!("urgency={}", urgency));
    }
    if let Some(by) = &self.changed_by {
      parts.push(format!("by={}", by));
    }
    for (key, value) in &self.extra {
      parts.push(format!("{}={}", key, value));
    }
    format!("{}{}", RELEASE_PREFIX, parts.join(","))
  }

  fn parse_header(line_no: usize, header: &str) -> Result<Self, HistoryError> {
    let parse_err = |message: String| HistoryError::Parse { line: line_no, message };

    // Values may contain commas; a segment without '=' continues the previous value.
    let mut pairs: Vec<(String, String)> = Vec::new();
    for segment in header.split(',') {
      match segment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() && !key.trim().contains(' ') => {
          pairs.push((key.trim().to_string(), value.trim().to_string()))
        }
        _ => match pairs.last_mut() {
          Some((_, value)) => {
            value.push(',');
            value.push_str(segment);
          }
          None => return Err(parse_err(format!("expected key=value, got {:?}", segment))),
        },
      }
    }

    let mut version = None;
    let mut entry = ReleaseEntry::new("");
    for (key, value) in pairs {
      match key.as_str() {
        "date" => {
          let date = NaiveDateTime::parse_from_str(&value, DATE_FORMAT)
            .map_err(|e| parse_err(format!("invalid date {:?}: {}", value, e)))?;
          entry.date = Some(date);
        }
        "version" => version = Some(value),
        "distribution" => entry.distribution = Some(value),
        "urgency" => entry.urgency = Some(value),
        "by" => entry.changed_by = Some(value),
        _ => entry.extra.push((key, value)),
      }
    }

    match version {
      Some(version) if !version.is_empty() => {
        entry.version = version;
        Ok(entry)
      }
      _ => Err(parse_err("release header has no version".to_string())),
    }
  }
}

/// All recorded releases plus the changes waiting for the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseHistory {
  pending: Vec<String>,
  entries: Vec<ReleaseEntry>,
}

impl ReleaseHistory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn parse(text: &str) -> Result<Self, HistoryError> {
    let mut history = Self::new();

    for (idx, line) in text.lines().enumerate() {
      let line_no = idx + 1;
      let trimmed = line.trim();
      if trimmed.is_empty() {
        continue;
      }

      if let Some(header) = line.strip_prefix(RELEASE_PREFIX) {
        history.entries.push(ReleaseEntry::parse_header(line_no, header)?);
        continue;
      }

      let Some(change) = trimmed.strip_prefix('*') else {
        return Err(HistoryError::Parse {
          line: line_no,
          message: format!("expected a 'release' header or a '* change' line, got {:?}", line),
        });
      };
      let change = change.trim().to_string();
      match history.entries.last_mut() {
        Some(entry) => entry.changes.push(change),
        None => history.pending.push(change),
      }
    }

    Ok(history)
  }

  /// Changes not yet assigned to a release.
  pub fn pending(&self) -> &[String] {
    &self.pending
  }

  pub fn add_pending(&mut self, change: impl Into<String>) {
    self.pending.push(change.into());
  }

  /// Releases, newest first.
  pub fn entries(&self) -> &[ReleaseEntry] {
    &self.entries
  }

  pub fn latest(&self) -> Option<&ReleaseEntry> {
    self.entries.first()
  }

  /// Record a release: pending changes move into `entry`, which becomes the newest.
  pub fn record_release(&mut self, mut entry: ReleaseEntry) -> &ReleaseEntry {
    let mut changes = std::mem::take(&mut self.pending);
    changes.append(&mut entry.changes);
    entry.changes = changes;
    self.entries.insert(0, entry);
    &self.entries[0]
  }

  pub fn render(&self) -> String {
    let mut out = String::new();
    for change in &self.pending {
      out.push_str(&format!(" * {}\n", change));
    }
    for entry in &self.entries {
      out.push_str(&entry.header());
      out.push('\n');
      for change in &entry.changes {
        out.push_str(&format!(" * {}\n", change));
      }
    }
    out
  }

  pub fn persist(&self, out: &mut dyn Write) -> Result<(), HistoryError> {
    out.write_all(self.render().as_bytes()).map_err(HistoryError::Write)?;
    out.flush().map_err(HistoryError::Write)
  }
}
