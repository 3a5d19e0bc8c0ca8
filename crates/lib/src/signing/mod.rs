//! Signing of changes documents.
//!
//! Keys are Ed25519 and live in a JSON keyring. A signed document is the
//! plain changes text wrapped in an envelope that names the key and carries
//! the signature over the exact body bytes.
//!
//! # Submodules
//!
//! - [`keyring`] - Keyring file format, key generation and passphrase sealing
//! - [`envelope`] - Signing and verifying the envelope

pub mod envelope;
pub mod keyring;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use envelope::{VerifiedChanges, is_signed, verify_signed_changes};
pub use keyring::{KEYRING_VERSION, KeyEntry, KeyMaterial, Keyring, Signer};

#[derive(Debug, Error)]
pub enum SigningError {
  #[error("failed to read keyring: {0}")]
  Read(#[source] io::Error),

  #[error("failed to parse keyring: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("unsupported keyring version: {0}")]
  UnsupportedVersion(u32),

  #[error("failed to write keyring {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("key '{0}' not found in keyring")]
  KeyNotFound(String),

  #[error("key '{0}' already exists in keyring")]
  DuplicateKey(String),

  #[error("keyring is empty")]
  EmptyKeyring,

  #[error("keyring holds {0} keys; select one with a key id")]
  AmbiguousKey(usize),

  #[error("key '{0}' is sealed; a passphrase is required")]
  PassphraseRequired(String),

  #[error("wrong passphrase for key '{0}'")]
  BadPassphrase(String),

  #[error("key '{id}' is invalid: {message}")]
  InvalidKey { id: String, message: String },

  #[error("malformed signed changes: {0}")]
  Malformed(String),

  #[error("signature does not match the signed changes")]
  InvalidSignature,

  #[error("signing key '{0}' is not trusted by the keyring")]
  UntrustedKey(String),
}
