// src/keys/mod.rs
//! Key management abstraction
//!
//! `KeyProvider` is the single capability the rest of the crate encrypts and
//! decrypts through. Which variant backs it is decided once, from explicit
//! configuration, by [`build_key_provider`]:
//!
//! - `local` → [`LocalStaticKeyProvider`] (key in process memory, demo only)
//! - `remote` → [`RemoteManagedKeyProvider`] over a [`KeyCustody`] service
//! - `unconfigured` → [`UnavailableKeyProvider`], which answers every call
//!   with `ServiceUnavailable` instead of silently substituting a demo key

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::aliases::PlainText;
use crate::config::KeysConfig;
use crate::crypto::Nonce96;
use crate::enums::KeyProviderKind;
use crate::error::{Result, VaultError};
use crate::submission::Submission;

#[cfg(feature = "aws-kms")]
pub mod kms;
pub mod local;
pub mod remote;

#[cfg(feature = "aws-kms")]
pub use kms::KmsCustody;
pub use local::LocalStaticKeyProvider;
pub use remote::{CustodyError, EncryptionContext, KeyCustody, RemoteManagedKeyProvider};

/// Output of an encrypt call: everything needed to decrypt later
#[derive(Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub nonce: Nonce96,
    pub key_id: Option<String>,
}

impl SealedPayload {
    pub fn of(submission: &Submission) -> Self {
        Self {
            ciphertext: submission.ciphertext.clone(),
            nonce: submission.nonce,
            key_id: submission.key_id.clone(),
        }
    }
}

impl fmt::Debug for SealedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedPayload")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Encrypt/decrypt capability. Key material never leaves the implementor.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    fn kind(&self) -> KeyProviderKind;

    /// Identity of the key new encryptions are sealed under
    async fn active_key_id(&self) -> Result<String>;

    async fn encrypt(&self, plaintext: &[u8]) -> Result<SealedPayload>;

    /// Whether a record tagged with `key_id` could ever be opened here.
    /// Providers that cannot enumerate their keys accept everything.
    fn recognizes_key(&self, _key_id: &str) -> bool {
        true
    }

    /// Fails with `AuthenticationFailure` on any tampering or wrong key
    async fn decrypt(&self, sealed: &SealedPayload) -> Result<PlainText>;
}

/// Placeholder when no key provider is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableKeyProvider;

#[async_trait]
impl KeyProvider for UnavailableKeyProvider {
    fn kind(&self) -> KeyProviderKind {
        KeyProviderKind::Unconfigured
    }

    async fn active_key_id(&self) -> Result<String> {
        Err(VaultError::ServiceUnavailable("key provider"))
    }

    async fn encrypt(&self, _plaintext: &[u8]) -> Result<SealedPayload> {
        Err(VaultError::ServiceUnavailable("key provider"))
    }

    async fn decrypt(&self, _sealed: &SealedPayload) -> Result<PlainText> {
        Err(VaultError::ServiceUnavailable("key provider"))
    }
}

/// Construct the configured key provider variant
pub async fn build_key_provider(config: &KeysConfig) -> Result<Arc<dyn KeyProvider>> {
    match config.provider {
        KeyProviderKind::Local => {
            let hex_key = config.local_key_hex.as_deref().ok_or_else(|| {
                VaultError::Config("keys.local_key_hex is required for the local provider".into())
            })?;
            let mut provider = LocalStaticKeyProvider::from_hex(hex_key)?;
            for retired in &config.previous_key_hex {
                provider = provider.with_retired_hex(retired)?;
            }
            Ok(Arc::new(provider))
        }
        KeyProviderKind::Remote => build_remote(config).await,
        KeyProviderKind::Unconfigured => {
            tracing::warn!("No key provider configured; encrypt/decrypt will report unavailable");
            Ok(Arc::new(UnavailableKeyProvider))
        }
    }
}

#[cfg(feature = "aws-kms")]
async fn build_remote(config: &KeysConfig) -> Result<Arc<dyn KeyProvider>> {
    let key_name = config.remote_key_name.as_deref().ok_or_else(|| {
        VaultError::Config("keys.remote_key_name is required for the remote provider".into())
    })?;
    let custody = KmsCustody::connect(config.remote_region.as_deref()).await;
    Ok(Arc::new(RemoteManagedKeyProvider::new(custody, key_name)))
}

#[cfg(not(feature = "aws-kms"))]
async fn build_remote(_config: &KeysConfig) -> Result<Arc<dyn KeyProvider>> {
    Err(VaultError::Config(
        "keys.provider = \"remote\" needs a build with the `aws-kms` feature".into(),
    ))
}
