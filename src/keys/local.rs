// src/keys/local.rs
//! Static in-process key provider
//!
//! Holds the active 256-bit key plus any retired keys still needed to read
//! older submissions. Keys are addressed by a BLAKE3-derived fingerprint, so
//! the stored `key_id` reveals nothing about the key itself.
//!
//! This variant exists for development and demos. Anyone holding the binary
//! or its config holds the key.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::aliases::{DataKey32, PlainText};
use crate::consts::{KEY_FINGERPRINT_CONTEXT, KEY_LEN};
use crate::crypto::{open, seal};
use crate::enums::KeyProviderKind;
use crate::error::{Result, VaultError};

use super::{KeyProvider, SealedPayload};

pub struct LocalStaticKeyProvider {
    active_id: String,
    keyring: HashMap<String, DataKey32>,
}

impl LocalStaticKeyProvider {
    pub fn new(key: DataKey32) -> Self {
        let active_id = Self::fingerprint(&key);
        warn!(
            key_id = %active_id,
            "LocalStaticKeyProvider in use: the key lives in process memory and provides \
             no real confidentiality once the binary or its config is distributed"
        );
        let mut keyring = HashMap::new();
        keyring.insert(active_id.clone(), key);
        Self { active_id, keyring }
    }

    /// Active key from 64 hex characters
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        Ok(Self::new(parse_key_hex(hex_key)?))
    }

    /// Keep an older key available for decryption only
    pub fn with_retired_key(mut self, key: DataKey32) -> Self {
        let id = Self::fingerprint(&key);
        if id != self.active_id {
            debug!(key_id = %id, "Retired key added to local keyring");
            self.keyring.insert(id, key);
        }
        self
    }

    pub fn with_retired_hex(self, hex_key: &str) -> Result<Self> {
        Ok(self.with_retired_key(parse_key_hex(hex_key)?))
    }

    pub fn key_id(&self) -> &str {
        &self.active_id
    }

    pub fn knows_key(&self, key_id: &str) -> bool {
        self.keyring.contains_key(key_id)
    }

    /// Stable, non-reversible key identity
    pub fn fingerprint(key: &DataKey32) -> String {
        let digest = blake3::derive_key(KEY_FINGERPRINT_CONTEXT, key.expose_secret());
        format!("local-{}", hex::encode(&digest[..8]))
    }

    fn key_for(&self, key_id: Option<&str>) -> Result<&DataKey32> {
        // Records without a key id predate rotation: they belong to the active key
        let id = key_id.unwrap_or(&self.active_id);
        self.keyring.get(id).ok_or_else(|| {
            warn!(key_id = %id, "Submission sealed under a key missing from the local keyring");
            VaultError::UnknownKey(id.to_string())
        })
    }
}

#[async_trait]
impl KeyProvider for LocalStaticKeyProvider {
    fn kind(&self) -> KeyProviderKind {
        KeyProviderKind::Local
    }

    async fn active_key_id(&self) -> Result<String> {
        Ok(self.active_id.clone())
    }

    fn recognizes_key(&self, key_id: &str) -> bool {
        self.knows_key(key_id)
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<SealedPayload> {
        let key = self.key_for(None)?;
        let (ciphertext, nonce) = seal(plaintext, key)?;
        debug!(
            plaintext_len = plaintext.len(),
            ciphertext_len = ciphertext.len(),
            "Sealed with local key"
        );
        Ok(SealedPayload {
            ciphertext,
            nonce,
            key_id: Some(self.active_id.clone()),
        })
    }

    async fn decrypt(&self, sealed: &SealedPayload) -> Result<PlainText> {
        let key = self.key_for(sealed.key_id.as_deref())?;
        open(&sealed.ciphertext, &sealed.nonce, key)
    }
}

fn parse_key_hex(hex_key: &str) -> Result<DataKey32> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|_| VaultError::Config("local key must be hex encoded".into()))?;
    let arr: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
        VaultError::Config(format!(
            "local key must be {KEY_LEN} bytes ({} hex chars), got {} bytes",
            KEY_LEN * 2,
            bytes.len()
        ))
    })?;
    Ok(DataKey32::new(arr))
}
