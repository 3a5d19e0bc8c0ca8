//! Build configuration.
//!
//! A `BuildConfig` is assembled once by the caller and then only read. Every
//! path is optional at construction time; the validator decides which
//! combinations are acceptable before any work starts.

use std::fmt;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::producer::DataProducer;

/// Passphrase unlocking a sealed signing key.
///
/// The value is never printed: `Debug` shows a redaction marker and there is
/// no `Display` impl. It is wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
  pub fn new(value: impl Into<String>) -> Self {
    Self(Zeroizing::new(value.into()))
  }

  pub fn expose(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Passphrase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Passphrase(<redacted>)")
  }
}

impl From<String> for Passphrase {
  fn from(value: String) -> Self {
    Self::new(value)
  }
}

impl From<&str> for Passphrase {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

/// Settings for a single package build.
#[derive(Default)]
pub struct BuildConfig {
  destination: Option<PathBuf>,
  control: Option<PathBuf>,
  changes_in: Option<PathBuf>,
  changes_out: Option<PathBuf>,
  keyring: Option<PathBuf>,
  key_id: Option<String>,
  passphrase: Option<Passphrase>,
  producers: Vec<Box<dyn DataProducer>>,
}

impl BuildConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Where the package archive is written.
  pub fn with_destination(mut self, path: impl Into<PathBuf>) -> Self {
    self.destination = Some(path.into());
    self
  }

  /// Directory holding `control` and the maintainer scripts.
  pub fn with_control(mut self, path: impl Into<PathBuf>) -> Self {
    self.control = Some(path.into());
    self
  }

  /// Release history read before, and rewritten after, the changes build.
  pub fn with_changes_in(mut self, path: impl Into<PathBuf>) -> Self {
    self.changes_in = Some(path.into());
    self
  }

  /// Destination of the changes record. Requesting it enables the changes step.
  pub fn with_changes_out(mut self, path: impl Into<PathBuf>) -> Self {
    self.changes_out = Some(path.into());
    self
  }

  pub fn with_keyring(mut self, path: impl Into<PathBuf>) -> Self {
    self.keyring = Some(path.into());
    self
  }

  pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
    self.key_id = Some(key_id.into());
    self
  }

  pub fn with_passphrase(mut self, passphrase: impl Into<Passphrase>) -> Self {
    self.passphrase = Some(passphrase.into());
    self
  }

  /// Append a data producer. Producers are enumerated in insertion order.
  pub fn with_producer(mut self, producer: impl DataProducer + 'static) -> Self {
    self.producers.push(Box::new(producer));
    self
  }

  pub fn with_boxed_producer(mut self, producer: Box<dyn DataProducer>) -> Self {
    self.producers.push(producer);
    self
  }

  pub fn destination(&self) -> Option<&Path> {
    self.destination.as_deref()
  }

  pub fn control(&self) -> Option<&Path> {
    self.control.as_deref()
  }

  pub fn changes_in(&self) -> Option<&Path> {
    self.changes_in.as_deref()
  }

  pub fn changes_out(&self) -> Option<&Path> {
    self.changes_out.as_deref()
  }

  pub fn keyring(&self) -> Option<&Path> {
    self.keyring.as_deref()
  }

  pub fn key_id(&self) -> Option<&str> {
    self.key_id.as_deref()
  }

  pub fn passphrase(&self) -> Option<&Passphrase> {
    self.passphrase.as_ref()
  }

  pub fn producers(&self) -> &[Box<dyn DataProducer>] {
    &self.producers
  }

  /// Whether a changes record was requested.
  pub fn wants_changes(&self) -> bool {
    self.changes_out.is_some()
  }
}

impl fmt::Debug for BuildConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuildConfig")
      .field("destination", &self.destination)
      .field("control", &self.control)
      .field("changes_in", &self.changes_in)
      .field("changes_out", &self.changes_out)
      .field("keyring", &self.keyring)
      .field("key_id", &self.key_id)
      .field("passphrase", &self.passphrase)
      .field("producers", &self.producers)
      .finish()
  }
}
