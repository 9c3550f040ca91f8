// src/store/mod.rs
//! Persistent collection of ciphertext records
//!
//! Two interchangeable backends sit behind [`SubmissionStore`]: a SQLite
//! database (default) and a directory of one JSON document per record. Both
//! guarantee that a successful `create`/`update`/`delete` is durable before it
//! returns and that a record is replaced whole, never partially written.

use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;

use crate::config::StoreConfig;
use crate::enums::StoreBackend;
use crate::error::{Result, ValidationErrors};
use crate::keys::SealedPayload;
use crate::submission::{IndexFieldsPatch, NewSubmission, Submission, SubmissionFilter};

pub mod file;
pub mod locks;
pub mod sqlite;

pub use file::FileStore;
pub use sqlite::SqliteStore;

const ID_BYTES: usize = 16;
const MAX_ID_LEN: usize = 64;

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    /// Assigns id and `submitted_at`
    async fn create(&self, new: NewSubmission) -> Result<Submission>;

    /// Newest first, ties by id ascending
    async fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>>;

    async fn get(&self, id: &str) -> Result<Submission>;

    /// Index fields only. Ciphertext and nonce are never touched here.
    async fn update(&self, id: &str, patch: &IndexFieldsPatch) -> Result<Submission>;

    /// `false` when nothing was stored under `id`
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Replace ciphertext, nonce and key id after a key rotation
    async fn reseal(&self, id: &str, sealed: &SealedPayload) -> Result<Submission>;

    async fn close(&self) -> Result<()>;
}

/// Open the configured backend
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn SubmissionStore>> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&config.path).await?)),
        StoreBackend::JsonFiles => Ok(Arc::new(FileStore::open(&config.path).await?)),
    }
}

/// Listing order shared by every backend
pub fn sort_newest_first(submissions: &mut [Submission]) {
    submissions.sort_by(|a, b| {
        b.submitted_at
            .cmp(&a.submitted_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Random 128-bit identifier, lowercase hex
pub(crate) fn new_submission_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Ids double as file names, so only a conservative alphabet is accepted
pub(crate) fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Shape checks every backend runs before persisting
pub(crate) fn validate_new(new: &NewSubmission) -> Result<()> {
    let mut errors = ValidationErrors::default();
    if new.ciphertext.is_empty() {
        errors.push("ciphertext", "ciphertext is required");
    }
    new.index.collect_errors(&mut errors);
    errors.into_result()
}

pub(crate) fn duplicate_nonce() -> crate::error::VaultError {
    crate::error::VaultError::invalid_field("nonce", "nonce was already used with this key")
}
