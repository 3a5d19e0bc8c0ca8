//! Changes records.
//!
//! After a package is built, a `ChangesEngine` reads the release history,
//! records the new release, writes a (optionally signed) changes document and
//! hands the updated history back for persisting.
//!
//! # Submodules
//!
//! - [`history`] - The plain-text release history
//! - [`engine`] - `TextChangesEngine`, the changes document writer

pub mod engine;
pub mod history;

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::config::Passphrase;
use crate::package::BuildDescriptor;
use crate::signing::SigningError;

pub use engine::TextChangesEngine;
pub use history::{HistoryError, ReleaseEntry, ReleaseHistory};

#[derive(Debug, Error)]
pub enum ChangesError {
  #[error("failed to read release history: {0}")]
  ReadHistory(#[source] io::Error),

  #[error(transparent)]
  History(#[from] HistoryError),

  #[error("signing failed: {0}")]
  Signing(#[from] SigningError),

  #[error("failed to write changes: {0}")]
  Write(#[source] io::Error),
}

/// What to sign the changes document with.
///
/// No keyring means the document is written unsigned.
#[derive(Default)]
pub struct SigningRequest<'a> {
  pub keyring: Option<&'a mut dyn Read>,
  pub key_id: Option<&'a str>,
  pub passphrase: Option<&'a Passphrase>,
}

/// Produces changes documents and maintains the release history.
pub trait ChangesEngine {
  fn read_history(&self, input: &mut dyn Read) -> Result<ReleaseHistory, ChangesError>;

  /// Record a release for `descriptor` in `history` and write the changes
  /// document for it to `out`.
  fn build_signed(
    &self,
    descriptor: &BuildDescriptor,
    history: &mut ReleaseHistory,
    signing: SigningRequest<'_>,
    out: &mut dyn Write,
  ) -> Result<(), ChangesError>;

  fn persist_history(&self, history: &ReleaseHistory, out: &mut dyn Write) -> Result<(), ChangesError> {
    history.persist(out)?;
    Ok(())
  }
}
