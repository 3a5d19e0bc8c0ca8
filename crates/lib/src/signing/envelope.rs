//! Signed changes envelope.
//!
//! ```text
//! -----BEGIN DEBFORGE SIGNED CHANGES-----
//! Key-Id: release
//! Public-Key: <hex>
//!
//! <changes body, newline terminated>
//! -----BEGIN DEBFORGE SIGNATURE-----
//! <hex Ed25519 signature over the body bytes>
//! -----END DEBFORGE SIGNATURE-----
//! ```

use ed25519_dalek::{Signature, Verifier};

use super::SigningError;
use super::keyring::{Keyring, Signer, parse_public_key};

const BEGIN_SIGNED: &str = "-----BEGIN DEBFORGE SIGNED CHANGES-----\n";
const BEGIN_SIGNATURE: &str = "-----BEGIN DEBFORGE SIGNATURE-----\n";
const END_SIGNATURE: &str = "-----END DEBFORGE SIGNATURE-----";

/// The contents of a verified envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedChanges {
  pub key_id: String,
  pub public_key: String,
  pub body: String,
}

pub fn is_signed(text: &str) -> bool {
  text.starts_with(BEGIN_SIGNED)
}

pub(super) fn wrap(signer: &Signer, body: &str) -> String {
  let mut body = body.to_string();
  if !body.ends_with('\n') {
    body.push('\n');
  }
  let signature = signer.sign(body.as_bytes());

  format!(
    "{}Key-Id: {}\nPublic-Key: {}\n\n{}{}{}\n{}\n",
    BEGIN_SIGNED,
    signer.key_id(),
    signer.public_key_hex(),
    body,
    BEGIN_SIGNATURE,
    hex::encode(signature),
    END_SIGNATURE
  )
}

/// Check an envelope's signature against the key it names.
///
/// With a keyring, the key must also be one of the keyring's keys.
pub fn verify_signed_changes(text: &str, keyring: Option<&Keyring>) -> Result<VerifiedChanges, SigningError> {
  let malformed = |message: &str| SigningError::Malformed(message.to_string());

  let rest = text
    .strip_prefix(BEGIN_SIGNED)
    .ok_or_else(|| malformed("missing begin marker"))?;
  let (headers, rest) = rest.split_once("\n\n").ok_or_else(|| malformed("missing header block"))?;

  let mut key_id = None;
  let mut public_key = None;
  for line in headers.lines() {
    match line.split_once(':') {
      Some(("Key-Id", value)) => key_id = Some(value.trim().to_string()),
      Some(("Public-Key", value)) => public_key = Some(value.trim().to_ascii_lowercase()),
      _ => return Err(SigningError::Malformed(format!("unexpected header line {:?}", line))),
    }
  }
  let key_id = key_id.ok_or_else(|| malformed("missing Key-Id header"))?;
  let public_key = public_key.ok_or_else(|| malformed("missing Public-Key header"))?;

  let marker = rest
    .rfind(BEGIN_SIGNATURE)
    .ok_or_else(|| malformed("missing signature block"))?;
  let body = &rest[..marker];
  let signature_block = &rest[marker + BEGIN_SIGNATURE.len()..];
  let (signature_hex, _) = signature_block
    .split_once(END_SIGNATURE)
    .ok_or_else(|| malformed("missing end marker"))?;

  let signature_bytes = hex::decode(signature_hex.trim()).map_err(|e| SigningError::Malformed(e.to_string()))?;
  let signature_bytes =
    <[u8; 64]>::try_from(signature_bytes.as_slice()).map_err(|_| malformed("signature must be 64 bytes"))?;
  let signature = Signature::from_bytes(&signature_bytes);

  parse_public_key(&key_id, &public_key)?
    .verify(body.as_bytes(), &signature)
    .map_err(|_| SigningError::InvalidSignature)?;

  if let Some(keyring) = keyring {
    let trusted = keyring
      .get(&key_id)
      .is_some_and(|entry| entry.public_key.eq_ignore_ascii_case(&public_key));
    if !trusted {
      return Err(SigningError::UntrustedKey(key_id));
    }
  }

  Ok(VerifiedChanges {
    key_id,
    public_key,
    body: body.to_string(),
  })
}
