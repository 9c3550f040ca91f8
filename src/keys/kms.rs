// src/keys/kms.rs
//! AWS KMS as a [`KeyCustody`] backend
//!
//! ## Encryption Flow
//! 1. `DescribeKey` turns the configured alias into a key ARN (once)
//! 2. `Encrypt` with the plaintext and the nonce as encryption context
//! 3. The returned ciphertext blob is stored as the submission ciphertext
//!
//! ## Decryption Flow
//! 1. `Decrypt` with the stored blob, key ARN and the same encryption context
//! 2. KMS refuses the call if either the blob or the context was altered
//!
//! KMS caps direct `Encrypt` at 4 KiB of plaintext. Larger payloads are
//! rejected by the service and surface as an upstream error.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_kms::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::Client as KmsClient;

use super::remote::{CustodyError, EncryptionContext, KeyCustody};

pub struct KmsCustody {
    client: KmsClient,
}

impl KmsCustody {
    pub fn new(client: KmsClient) -> Self {
        Self { client }
    }

    /// Client from the default AWS credential chain
    pub async fn connect(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;
        Self::new(KmsClient::new(&sdk_config))
    }
}

#[async_trait]
impl KeyCustody for KmsCustody {
    async fn resolve_key(&self, key_name: &str) -> Result<String, CustodyError> {
        let resp = self
            .client
            .describe_key()
            .key_id(key_name)
            .send()
            .await
            .map_err(classify)?;
        resp.key_metadata()
            .and_then(|meta| meta.arn())
            .map(str::to_string)
            .ok_or_else(|| CustodyError::NotFound(key_name.to_string()))
    }

    async fn encrypt(
        &self,
        key_handle: &str,
        plaintext: &[u8],
        context: &EncryptionContext,
    ) -> Result<Vec<u8>, CustodyError> {
        let mut req = self
            .client
            .encrypt()
            .key_id(key_handle)
            .plaintext(Blob::new(plaintext));
        for (k, v) in context {
            req = req.encryption_context(k, v);
        }
        let resp = req.send().await.map_err(classify)?;
        resp.ciphertext_blob()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| CustodyError::Unavailable("KMS returned no ciphertext".into()))
    }

    async fn decrypt(
        &self,
        key_handle: &str,
        ciphertext: &[u8],
        context: &EncryptionContext,
    ) -> Result<Vec<u8>, CustodyError> {
        let mut req = self
            .client
            .decrypt()
            .key_id(key_handle)
            .ciphertext_blob(Blob::new(ciphertext));
        for (k, v) in context {
            req = req.encryption_context(k, v);
        }
        let resp = req.send().await.map_err(classify)?;
        resp.plaintext()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| CustodyError::Unavailable("KMS returned no plaintext".into()))
    }
}

fn classify<E, R>(err: SdkError<E, R>) -> CustodyError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if let SdkError::ServiceError(ctx) = &err {
        let service_err = ctx.err();
        let message = service_err.message().unwrap_or_default().to_string();
        return match service_err.code() {
            Some("NotFoundException") => CustodyError::NotFound(message),
            Some("AccessDeniedException") | Some("DisabledException") => {
                CustodyError::Unauthorized(message)
            }
            Some("InvalidCiphertextException") | Some("IncorrectKeyException") => {
                CustodyError::InvalidCiphertext
            }
            code => CustodyError::Unavailable(format!(
                "{}: {message}",
                code.unwrap_or("UnknownError")
            )),
        };
    }
    // Timeouts, dispatch and response failures never reached the service logic
    CustodyError::Unavailable(err.to_string())
}
