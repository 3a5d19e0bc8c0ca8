//! Keyring file format.
//!
//! ```json
//! {
//!   "version": 1,
//!   "keys": [
//!     { "id": "release", "public_key": "<hex>", "protection": "plain", "secret": "<hex>" },
//!     { "id": "ci", "public_key": "<hex>", "protection": "sealed", "salt": "<hex>", "nonce": "<hex>", "secret": "<hex>" }
//!   ]
//! }
//! ```
//!
//! A sealed secret is the 32-byte seed encrypted with XChaCha20-Poly1305 under
//! a key derived from the passphrase and salt with HKDF-SHA256. The public key
//! is the associated data, so a sealed secret cannot be moved to another entry.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::SigningError;
use super::envelope;
use crate::config::Passphrase;
use crate::util::staging::{StagedFile, parent_dir};

pub const KEYRING_VERSION: u32 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const SEAL_INFO: &[u8] = b"debforge keyring seal v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyring {
  pub version: u32,
  pub keys: Vec<KeyEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
  pub id: String,
  /// Hex-encoded Ed25519 public key.
  pub public_key: String,
  #[serde(flatten)]
  pub material: KeyMaterial,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protection", rename_all = "lowercase")]
pub enum KeyMaterial {
  Plain { secret: String },
  Sealed { salt: String, nonce: String, secret: String },
}

impl fmt::Debug for KeyMaterial {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeyMaterial::Plain { .. } => f.write_str("Plain(<redacted>)"),
      KeyMaterial::Sealed { .. } => f.write_str("Sealed(<redacted>)"),
    }
  }
}

impl Default for Keyring {
  fn default() -> Self {
    Self::new()
  }
}

impl Keyring {
  pub fn new() -> Self {
    Self {
      version: KEYRING_VERSION,
      keys: Vec::new(),
    }
  }

  pub fn from_reader(reader: &mut dyn Read) -> Result<Self, SigningError> {
    let keyring: Keyring = serde_json::from_reader(reader).map_err(SigningError::Parse)?;
    if keyring.version != KEYRING_VERSION {
      return Err(SigningError::UnsupportedVersion(keyring.version));
    }
    Ok(keyring)
  }

  pub fn load(path: &Path) -> Result<Self, SigningError> {
    let mut file = File::open(path).map_err(SigningError::Read)?;
    Self::from_reader(&mut file)
  }

  /// Write the keyring to `path` atomically.
  pub fn save(&self, path: &Path) -> Result<(), SigningError> {
    let write_err = |source| SigningError::Write {
      path: path.to_path_buf(),
      source,
    };

    fs::create_dir_all(parent_dir(path)).map_err(write_err)?;
    let mut staged = StagedFile::new(path).map_err(write_err)?;
    {
      let mut writer = BufWriter::new(staged.file_mut());
      serde_json::to_writer_pretty(&mut writer, self).map_err(|e| write_err(e.into()))?;
      writer.write_all(b"\n").map_err(write_err)?;
      writer.flush().map_err(write_err)?;
    }
    staged.commit().map_err(write_err)?;

    debug!(path = %path.display(), keys = self.keys.len(), "keyring saved");
    Ok(())
  }

  pub fn get(&self, id: &str) -> Option<&KeyEntry> {
    self.keys.iter().find(|key| key.id == id)
  }

  /// Generate a new key, sealing it when a passphrase is given.
  pub fn generate(&mut self, id: &str, passphrase: Option<&Passphrase>) -> Result<&KeyEntry, SigningError> {
    if id.trim().is_empty() {
      return Err(SigningError::InvalidKey {
        id: id.to_string(),
        message: "key id must not be empty".to_string(),
      });
    }
    if self.get(id).is_some() {
      return Err(SigningError::DuplicateKey(id.to_string()));
    }

    let signing_key = SigningKey::generate(&mut OsRng);
    let seed = Zeroizing::new(signing_key.to_bytes());
    let public_key = hex::encode(signing_key.verifying_key().to_bytes());
    let material = match passphrase {
      Some(passphrase) => seal(id, &seed, passphrase, &public_key)?,
      None => KeyMaterial::Plain {
        secret: hex::encode(seed.as_slice()),
      },
    };

    self.keys.push(KeyEntry {
      id: id.to_string(),
      public_key,
      material,
    });
    info!(key = id, sealed = passphrase.is_some(), "generated signing key");

    let last = self.keys.len() - 1;
    Ok(&self.keys[last])
  }

  /// Pick the signing key: by id, or the only key in the keyring.
  pub fn select(&self, key_id: Option<&str>) -> Result<&KeyEntry, SigningError> {
    match key_id {
      Some(id) => self.get(id).ok_or_else(|| SigningError::KeyNotFound(id.to_string())),
      None => match self.keys.as_slice() {
        [] => Err(SigningError::EmptyKeyring),
        [only] => Ok(only),
        keys => Err(SigningError::AmbiguousKey(keys.len())),
      },
    }
  }

  pub fn signer(&self, key_id: Option<&str>, passphrase: Option<&Passphrase>) -> Result<Signer, SigningError> {
    let entry = self.select(key_id)?;
    Ok(Signer {
      key_id: entry.id.clone(),
      key: entry.signing_key(passphrase)?,
    })
  }
}

impl KeyEntry {
  pub fn is_sealed(&self) -> bool {
    matches!(self.material, KeyMaterial::Sealed { .. })
  }

  pub fn verifying_key(&self) -> Result<VerifyingKey, SigningError> {
    parse_public_key(&self.id, &self.public_key)
  }

  /// Recover the private key, unsealing it with `passphrase` if needed.
  pub fn signing_key(&self, passphrase: Option<&Passphrase>) -> Result<SigningKey, SigningError> {
    let seed = match &self.material {
      KeyMaterial::Plain { secret } => Zeroizing::new(decode_32(&self.id, "secret", secret)?),
      KeyMaterial::Sealed { salt, nonce, secret } => {
        let passphrase = passphrase.ok_or_else(|| SigningError::PassphraseRequired(self.id.clone()))?;
        unseal(self, passphrase, salt, nonce, secret)?
      }
    };

    let key = SigningKey::from_bytes(&seed);
    if hex::encode(key.verifying_key().to_bytes()) != self.public_key.to_ascii_lowercase() {
      return Err(SigningError::InvalidKey {
        id: self.id.clone(),
        message: "secret does not match public key".to_string(),
      });
    }
    Ok(key)
  }
}

/// A private key ready to sign.
pub struct Signer {
  key_id: String,
  key: SigningKey,
}

impl fmt::Debug for Signer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Signer").field("key_id", &self.key_id).finish_non_exhaustive()
  }
}

impl Signer {
  pub fn key_id(&self) -> &str {
    &self.key_id
  }

  pub fn public_key_hex(&self) -> String {
    hex::encode(self.key.verifying_key().to_bytes())
  }

  pub fn sign(&self, message: &[u8]) -> [u8; 64] {
    self.key.sign(message).to_bytes()
  }

  /// Wrap `body` in a signed envelope.
  pub fn sign_changes(&self, body: &str) -> String {
    envelope::wrap(self, body)
  }
}

pub(super) fn parse_public_key(id: &str, public_key: &str) -> Result<VerifyingKey, SigningError> {
  let bytes = decode_32(id, "public key", public_key)?;
  VerifyingKey::from_bytes(&bytes).map_err(|e| SigningError::InvalidKey {
    id: id.to_string(),
    message: e.to_string(),
  })
}

fn decode_32(id: &str, what: &str, value: &str) -> Result<[u8; 32], SigningError> {
  let invalid = |message: String| SigningError::InvalidKey {
    id: id.to_string(),
    message: format!("{}: {}", what, message),
  };
  let bytes = hex::decode(value).map_err(|e| invalid(e.to_string()))?;
  <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| invalid(format!("expected 32 bytes, got {}", bytes.len())))
}

fn hex_field(id: &str, what: &str, value: &str) -> Result<Vec<u8>, SigningError> {
  hex::decode(value).map_err(|e| SigningError::InvalidKey {
    id: id.to_string(),
    message: format!("{}: {}", what, e),
  })
}

fn seal_cipher(id: &str, passphrase: &Passphrase, salt: &[u8]) -> Result<XChaCha20Poly1305, SigningError> {
  let mut key = Zeroizing::new([0u8; 32]);
  Hkdf::<Sha256>::new(Some(salt), passphrase.expose().as_bytes())
    .expand(SEAL_INFO, key.as_mut_slice())
    .map_err(|e| SigningError::InvalidKey {
      id: id.to_string(),
      message: format!("key derivation: {}", e),
    })?;
  Ok(XChaCha20Poly1305::new(Key::from_slice(key.as_slice())))
}

fn seal(id: &str, seed: &[u8; 32], passphrase: &Passphrase, public_key: &str) -> Result<KeyMaterial, SigningError> {
  let mut salt = [0u8; SALT_LEN];
  OsRng.fill_bytes(&mut salt);
  let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

  let secret = seal_cipher(id, passphrase, &salt)?
    .encrypt(
      &nonce,
      Payload {
        msg: seed,
        aad: public_key.as_bytes(),
      },
    )
    .map_err(|e| SigningError::InvalidKey {
      id: id.to_string(),
      message: format!("sealing failed: {}", e),
    })?;

  Ok(KeyMaterial::Sealed {
    salt: hex::encode(salt),
    nonce: hex::encode(nonce),
    secret: hex::encode(secret),
  })
}

fn unseal(
  entry: &KeyEntry,
  passphrase: &Passphrase,
  salt: &str,
  nonce: &str,
  secret: &str,
) -> Result<Zeroizing<[u8; 32]>, SigningError> {
  let id = entry.id.as_str();
  let salt = hex_field(id, "salt", salt)?;
  let nonce = hex_field(id, "nonce", nonce)?;
  if nonce.len() != NONCE_LEN {
    return Err(SigningError::InvalidKey {
      id: id.to_string(),
      message: format!("nonce: expected {} bytes, got {}", NONCE_LEN, nonce.len()),
    });
  }
  let secret = hex_field(id, "secret", secret)?;

  // Authentication failure covers both a wrong passphrase and a tampered entry.
  let plain = Zeroizing::new(
    seal_cipher(id, passphrase, &salt)?
      .decrypt(
        XNonce::from_slice(&nonce),
        Payload {
          msg: &secret,
          aad: entry.public_key.to_ascii_lowercase().as_bytes(),
        },
      )
      .map_err(|_| SigningError::BadPassphrase(id.to_string()))?,
  );

  let mut seed = Zeroizing::new([0u8; 32]);
  if plain.len() != seed.len() {
    return Err(SigningError::InvalidKey {
      id: id.to_string(),
      message: format!("secret: expected 32 bytes, got {}", plain.len()),
    });
  }
  seed.copy_from_slice(&plain);
  Ok(seed)
}
