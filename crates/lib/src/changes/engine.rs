//! The text changes engine.
//!
//! Writes a deb822-style changes document for the new release:
//!
//! ```text
//! Format: 1.8
//! Date: Mon, 19 Oct 2026 14:05:00 +0000
//! Source: hello
//! Binary: hello
//! ...
//! Changes:
//!  hello (1.2.3) stable; urgency=low
//!  .
//!    * fixed the frobnicator
//! Checksums-Sha256:
//!  <sha256> <size> hello_1.2.3_amd64.deb
//! ```

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::history::{ReleaseEntry, ReleaseHistory};
use super::{ChangesEngine, ChangesError, SigningRequest};
use crate::package::BuildDescriptor;
use crate::signing::Keyring;

const FORMAT_VERSION: &str = "1.8";

#[derive(Debug, Clone, Default)]
pub struct TextChangesEngine {
  clock: Option<DateTime<Utc>>,
}

impl TextChangesEngine {
  pub fn new() -> Self {
    Self::default()
  }

  /// An engine whose clock is fixed at `now`.
  pub fn at(now: DateTime<Utc>) -> Self {
    Self { clock: Some(now) }
  }

  fn now(&self) -> DateTime<Utc> {
    self.clock.unwrap_or_else(Utc::now)
  }
}

impl ChangesEngine for TextChangesEngine {
  fn read_history(&self, input: &mut dyn Read) -> Result<ReleaseHistory, ChangesError> {
    let mut text = String::new();
    input.read_to_string(&mut text).map_err(ChangesError::ReadHistory)?;
    Ok(ReleaseHistory::parse(&text)?)
  }

  fn build_signed(
    &self,
    descriptor: &BuildDescriptor,
    history: &mut ReleaseHistory,
    signing: SigningRequest<'_>,
    out: &mut dyn Write,
  ) -> Result<(), ChangesError> {
    let now = self.now();

    let mut entry = ReleaseEntry::new(&descriptor.version);
    entry.date = Some(now.naive_utc());
    entry.distribution = Some(descriptor.distribution.clone());
    entry.urgency = Some(descriptor.urgency.clone());
    entry.changed_by = Some(descriptor.maintainer.clone());
    let release = history.record_release(entry);

    let body = render_changes(descriptor, release, now);

    let document = match signing.keyring {
      Some(reader) => {
        let keyring = Keyring::from_reader(reader)?;
        let signer = keyring.signer(signing.key_id, signing.passphrase)?;
        info!(key = signer.key_id(), "signing changes");
        signer.sign_changes(&body)
      }
      None => {
        if let Some(key_id) = signing.key_id {
          warn!(key = key_id, "no keyring configured, writing unsigned changes");
        }
        body
      }
    };

    out.write_all(document.as_bytes()).map_err(ChangesError::Write)?;
    out.flush().map_err(ChangesError::Write)?;
    Ok(())
  }
}

/// Render the changes document for `release` of the package in `descriptor`.
pub fn render_changes(descriptor: &BuildDescriptor, release: &ReleaseEntry, now: DateTime<Utc>) -> String {
  let control = |name: &str| {
    descriptor
      .control
      .iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  };
  let source = control("Source").unwrap_or(&descriptor.package);
  let distribution = release.distribution.as_deref().unwrap_or(&descriptor.distribution);
  let urgency = release.urgency.as_deref().unwrap_or(&descriptor.urgency);

  let mut fields: Vec<(&str, String)> = vec![
    ("Format", FORMAT_VERSION.to_string()),
    ("Date", now.to_rfc2822()),
    ("Source", source.to_string()),
    ("Binary", descriptor.package.clone()),
    ("Architecture", descriptor.architecture.clone()),
    ("Version", release.version.clone()),
    ("Distribution", distribution.to_string()),
    ("Urgency", urgency.to_string()),
    ("Maintainer", descriptor.maintainer.clone()),
    (
      "Changed-By",
      release.changed_by.clone().unwrap_or_else(|| descriptor.maintainer.clone()),
    ),
    (
      "Description",
      format!("\n{} - {}", descriptor.package, descriptor.summary()),
    ),
  ];

  let mut changes = format!(
    "\n{} ({}) {}; urgency={}\n.",
    source, release.version, distribution, urgency
  );
  for change in &release.changes {
    changes.push_str(&format!("\n  * {}", change));
  }
  fields.push(("Changes", changes));

  fields.push((
    "Checksums-Sha256",
    format!(
      "\n{} {} {}",
      descriptor.archive.sha256, descriptor.archive.size, descriptor.archive.file_name
    ),
  ));

  let mut out = String::new();
  for (name, value) in fields {
    out.push_str(name);
    out.push(':');
    for (idx, line) in value.split('\n').enumerate() {
      if idx > 0 {
        out.push_str("\n ");
      } else if !line.is_empty() {
        out.push(' ');
      }
      out.push_str(line);
    }
    out.push('\n');
  }
  out
}
