// src/crypto/aead.rs
//! AES-256-GCM codec
//!
//! Wire shape of a sealed value: `ciphertext || tag(16)` with the 12-byte
//! nonce carried separately. Nonces are always generated here from the
//! thread CSPRNG; no encrypt path accepts a caller nonce.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::aliases::{DataKey32, PlainText};
use crate::consts::{NONCE_LEN, TAG_LEN};
use crate::encoding::{b64_decode, b64_encode};
use crate::error::{Result, VaultError};

/// 96-bit nonce, used exactly once per key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce96([u8; NONCE_LEN]);

impl Nonce96 {
    /// Fresh random nonce
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        b64_encode(&self.0)
    }
}

impl TryFrom<&[u8]> for Nonce96 {
    type Error = VaultError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; NONCE_LEN] = bytes.try_into().map_err(|_| {
            VaultError::invalid_field(
                "nonce",
                format!("nonce must be {NONCE_LEN} bytes, got {}", bytes.len()),
            )
        })?;
        Ok(Self(arr))
    }
}

// Only the length is ever printed
impl fmt::Debug for Nonce96 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce96(<{NONCE_LEN} bytes>)")
    }
}

impl Serialize for Nonce96 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Nonce96 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = b64_decode(&text).map_err(de::Error::custom)?;
        Nonce96::try_from(bytes.as_slice()).map_err(de::Error::custom)
    }
}

fn cipher_for(key: &DataKey32) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose_secret()))
}

/// Encrypt `plaintext` under `key` with a freshly generated nonce
pub fn seal(plaintext: &[u8], key: &DataKey32) -> Result<(Vec<u8>, Nonce96)> {
    seal_with_aad(plaintext, b"", key)
}

/// Decrypt and verify. Any tag mismatch is `AuthenticationFailure`.
pub fn open(ciphertext: &[u8], nonce: &Nonce96, key: &DataKey32) -> Result<PlainText> {
    open_with_aad(ciphertext, nonce, b"", key)
}

/// `seal` with additional authenticated data bound to the ciphertext
pub fn seal_with_aad(plaintext: &[u8], aad: &[u8], key: &DataKey32) -> Result<(Vec<u8>, Nonce96)> {
    let nonce = Nonce96::generate();
    let ciphertext = cipher_for(key)
        .encrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| VaultError::Internal("AES-GCM encryption failed".into()))?;
    Ok((ciphertext, nonce))
}

pub fn open_with_aad(
    ciphertext: &[u8],
    nonce: &Nonce96,
    aad: &[u8],
    key: &DataKey32,
) -> Result<PlainText> {
    // Too short to even hold a tag: cannot be authentic
    if ciphertext.len() < TAG_LEN {
        return Err(VaultError::AuthenticationFailure);
    }
    let plaintext = cipher_for(key)
        .decrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| VaultError::AuthenticationFailure)?;
    Ok(PlainText::new(plaintext))
}
