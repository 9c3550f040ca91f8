// src/keys/remote.rs
//! Remote managed key provider
//!
//! Encryption and decryption are delegated to a key custody service; the key
//! itself never enters this process. The 12-byte nonce this crate stores is
//! bound into the request as encryption context, so a ciphertext can only be
//! opened alongside the nonce it was stored with.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::aliases::PlainText;
use crate::consts::REMOTE_NONCE_CONTEXT_KEY;
use crate::crypto::Nonce96;
use crate::enums::KeyProviderKind;
use crate::error::{Result, VaultError};

use super::{KeyProvider, SealedPayload};

/// Additional authenticated key/value pairs sent with every custody call
pub type EncryptionContext = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    Unauthorized(String),
    #[error("ciphertext rejected by key service")]
    InvalidCiphertext,
    #[error("key service unavailable: {0}")]
    Unavailable(String),
}

/// A service that holds a key and performs encrypt/decrypt on request
#[async_trait]
pub trait KeyCustody: Send + Sync {
    /// Resolve an alias or name to the handle used on every later call
    async fn resolve_key(&self, key_name: &str) -> std::result::Result<String, CustodyError>;

    async fn encrypt(
        &self,
        key_handle: &str,
        plaintext: &[u8],
        context: &EncryptionContext,
    ) -> std::result::Result<Vec<u8>, CustodyError>;

    async fn decrypt(
        &self,
        key_handle: &str,
        ciphertext: &[u8],
        context: &EncryptionContext,
    ) -> std::result::Result<Vec<u8>, CustodyError>;
}

#[async_trait]
impl<C: KeyCustody + ?Sized> KeyCustody for Arc<C> {
    async fn resolve_key(&self, key_name: &str) -> std::result::Result<String, CustodyError> {
        (**self).resolve_key(key_name).await
    }

    async fn encrypt(
        &self,
        key_handle: &str,
        plaintext: &[u8],
        context: &EncryptionContext,
    ) -> std::result::Result<Vec<u8>, CustodyError> {
        (**self).encrypt(key_handle, plaintext, context).await
    }

    async fn decrypt(
        &self,
        key_handle: &str,
        ciphertext: &[u8],
        context: &EncryptionContext,
    ) -> std::result::Result<Vec<u8>, CustodyError> {
        (**self).decrypt(key_handle, ciphertext, context).await
    }
}

pub struct RemoteManagedKeyProvider<C: KeyCustody> {
    custody: C,
    key_name: String,
    key_handle: OnceCell<String>,
}

impl<C: KeyCustody> RemoteManagedKeyProvider<C> {
    pub fn new(custody: C, key_name: impl Into<String>) -> Self {
        Self {
            custody,
            key_name: key_name.into(),
            key_handle: OnceCell::new(),
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Resolved once, then reused for the life of the provider
    async fn handle(&self) -> Result<&str> {
        let handle = self
            .key_handle
            .get_or_try_init(|| async {
                let handle = self
                    .custody
                    .resolve_key(&self.key_name)
                    .await
                    .map_err(map_custody_error)?;
                info!(key_name = %self.key_name, key_handle = %handle, "Resolved remote key");
                Ok::<_, VaultError>(handle)
            })
            .await?;
        Ok(handle.as_str())
    }
}

#[async_trait]
impl<C: KeyCustody> KeyProvider for RemoteManagedKeyProvider<C> {
    fn kind(&self) -> KeyProviderKind {
        KeyProviderKind::Remote
    }

    async fn active_key_id(&self) -> Result<String> {
        self.handle().await.map(str::to_string)
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<SealedPayload> {
        let handle = self.handle().await?;
        let nonce = Nonce96::generate();
        let ciphertext = self
            .custody
            .encrypt(handle, plaintext, &nonce_context(&nonce))
            .await
            .map_err(map_custody_error)?;
        debug!(
            key_handle = %handle,
            ciphertext_len = ciphertext.len(),
            "Sealed through key custody"
        );
        Ok(SealedPayload {
            ciphertext,
            nonce,
            key_id: Some(handle.to_string()),
        })
    }

    async fn decrypt(&self, sealed: &SealedPayload) -> Result<PlainText> {
        let handle = match sealed.key_id.as_deref() {
            Some(id) => id,
            None => self.handle().await?,
        };
        let plaintext = self
            .custody
            .decrypt(handle, &sealed.ciphertext, &nonce_context(&sealed.nonce))
            .await
            .map_err(|err| match err {
                // The record's own key handle, not the configured alias
                CustodyError::NotFound(_) if sealed.key_id.is_some() => {
                    warn!(key_handle = %handle, "Submission sealed under a key unknown to custody");
                    VaultError::UnknownKey(handle.to_string())
                }
                other => map_custody_error(other),
            })?;
        Ok(PlainText::new(plaintext))
    }
}

fn nonce_context(nonce: &Nonce96) -> EncryptionContext {
    let mut context = EncryptionContext::new();
    context.insert(REMOTE_NONCE_CONTEXT_KEY.to_string(), nonce.to_base64());
    context
}

fn map_custody_error(err: CustodyError) -> VaultError {
    match err {
        CustodyError::InvalidCiphertext => {
            warn!(target: "security", "Key custody rejected a ciphertext");
            VaultError::AuthenticationFailure
        }
        CustodyError::Unauthorized(msg) => {
            error!(target: "security", error = %msg, "Key custody denied access");
            VaultError::upstream("key-custody", format!("access denied: {msg}"))
        }
        other => {
            error!(error = %other, "Key custody call failed");
            VaultError::upstream("key-custody", other.to_string())
        }
    }
}
