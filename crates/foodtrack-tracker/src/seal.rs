//! Envelope encryption for customer contact details.
//!
//! Each contacts bundle gets its own random data key. Customer phone and
//! address are sealed under that key with XChaCha20-Poly1305; the data key is
//! then sealed under the process master key and stored next to the bundle.
//! Losing the master key makes every stored bundle unreadable, which is fine:
//! bundles live for an hour.
//!
//! Sealed values are `base64(nonce || ciphertext)` with a 24-byte nonce.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chacha20poly1305::{
  Key, XChaCha20Poly1305, XNonce,
  aead::{Aead, KeyInit},
};
use foodtrack_core::contacts::SealedValue;
use rand_core::{OsRng, RngCore};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum Error {
  #[error("master key must be 32 bytes of hex: {0}")]
  InvalidMasterKey(String),

  #[error("encryption failed")]
  Encrypt,

  /// Wrong key, truncated input or tampered ciphertext.
  #[error("decryption failed")]
  Decrypt,

  #[error("sealed value is not valid base64: {0}")]
  Encoding(#[from] base64::DecodeError),

  #[error("decrypted value is not valid UTF-8")]
  Utf8,

  #[error("no data key available for this role")]
  KeyUnavailable,
}

// ─── Primitives ──────────────────────────────────────────────────────────────

fn random_key() -> Key {
  let mut bytes = [0u8; KEY_LEN];
  OsRng.fill_bytes(&mut bytes);
  Key::clone_from_slice(&bytes)
}

fn seal_bytes(key: &Key, plaintext: &[u8]) -> Result<SealedValue, Error> {
  let mut nonce = [0u8; NONCE_LEN];
  OsRng.fill_bytes(&mut nonce);

  let ciphertext = XChaCha20Poly1305::new(key)
    .encrypt(XNonce::from_slice(&nonce), plaintext)
    .map_err(|_| Error::Encrypt)?;

  let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
  out.extend_from_slice(&nonce);
  out.extend_from_slice(&ciphertext);
  Ok(SealedValue(B64.encode(out)))
}

fn open_bytes(key: &Key, sealed: &SealedValue) -> Result<Vec<u8>, Error> {
  let raw = B64.decode(&sealed.0)?;
  if raw.len() < NONCE_LEN {
    return Err(Error::Decrypt);
  }
  let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

  XChaCha20Poly1305::new(key)
    .decrypt(XNonce::from_slice(nonce), ciphertext)
    .map_err(|_| Error::Decrypt)
}

// ─── Data key ────────────────────────────────────────────────────────────────

/// The per-bundle key. Never persisted unwrapped.
pub struct DataKey(Key);

impl DataKey {
  pub fn seal(&self, plaintext: &str) -> Result<SealedValue, Error> {
    seal_bytes(&self.0, plaintext.as_bytes())
  }

  pub fn open(&self, sealed: &SealedValue) -> Result<String, Error> {
    String::from_utf8(open_bytes(&self.0, sealed)?).map_err(|_| Error::Utf8)
  }
}

impl fmt::Debug for DataKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "DataKey(***REDACTED***)")
  }
}

// ─── Sealer ──────────────────────────────────────────────────────────────────

/// Holds the master key and issues per-bundle data keys.
pub struct ContactSealer {
  master: Key,
}

impl ContactSealer {
  pub fn new(master_key: [u8; KEY_LEN]) -> Self {
    Self { master: Key::clone_from_slice(&master_key) }
  }

  /// Parse a 64-character hex master key.
  pub fn from_hex(hex_key: &str) -> Result<Self, Error> {
    let bytes = hex::decode(hex_key.trim()).map_err(|e| Error::InvalidMasterKey(e.to_string()))?;
    let key: [u8; KEY_LEN] = bytes
      .try_into()
      .map_err(|b: Vec<u8>| Error::InvalidMasterKey(format!("got {} bytes", b.len())))?;
    Ok(Self::new(key))
  }

  /// A sealer with a random master key. Bundles sealed by it cannot be read
  /// after the process exits.
  pub fn ephemeral() -> Self { Self { master: random_key() } }

  /// Generate a data key and its wrapped form for storage.
  pub fn issue_data_key(&self) -> Result<(DataKey, SealedValue), Error> {
    let key = random_key();
    let wrapped = seal_bytes(&self.master, key.as_slice())?;
    Ok((DataKey(key), wrapped))
  }

  pub fn unwrap_data_key(&self, wrapped: &SealedValue) -> Result<DataKey, Error> {
    let bytes = open_bytes(&self.master, wrapped)?;
    if bytes.len() != KEY_LEN {
      return Err(Error::Decrypt);
    }
    Ok(DataKey(Key::clone_from_slice(&bytes)))
  }
}

impl fmt::Debug for ContactSealer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ContactSealer(***REDACTED***)")
  }
}
