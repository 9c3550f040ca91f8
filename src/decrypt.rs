// src/decrypt.rs
//! Decryption orchestrator
//!
//! Fetch → key provider decrypt → payload parse → [`DecryptedView`]. The view
//! carries public metadata and decrypted fields only; ciphertext and nonce
//! never leave this module.
//!
//! Batch decryption fans out with bounded concurrency. Each id runs under its
//! own deadline and lands in exactly one of `successes` or `failures`, so
//! `successes.len() + failures.len() == ids.len()` always holds.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::DecryptConfig;
use crate::consts::{DEFAULT_DECRYPT_CONCURRENCY, DEFAULT_DECRYPT_TIMEOUT_MS};
use crate::crypto::decode_payload;
use crate::error::{ErrorKind, Result, VaultError};
use crate::keys::{KeyProvider, SealedPayload};
use crate::store::SubmissionStore;
use crate::submission::{DecryptedView, Submission, SubmissionFilter};

/// One id that could not be decrypted, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub id: String,
    pub reason: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDecryptReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub total: usize,
    pub successes: Vec<DecryptedView>,
    pub failures: Vec<BatchFailure>,
}

impl BatchDecryptReport {
    /// Partition per-id outcomes, keeping input order within each side
    pub fn from_results(results: Vec<(String, Result<DecryptedView>)>) -> Self {
        let total = results.len();
        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (id, result) in results {
            match result {
                Ok(view) => successes.push(view),
                Err(e) => failures.push(BatchFailure {
                    id,
                    reason: e.kind(),
                    message: e.to_body().message,
                }),
            }
        }
        Self {
            success_count: successes.len(),
            failure_count: failures.len(),
            total,
            successes,
            failures,
        }
    }
}

pub struct DecryptionOrchestrator {
    store: Arc<dyn SubmissionStore>,
    keys: Arc<dyn KeyProvider>,
    concurrency: usize,
    per_item_timeout: Duration,
}

impl DecryptionOrchestrator {
    pub fn new(store: Arc<dyn SubmissionStore>, keys: Arc<dyn KeyProvider>) -> Self {
        Self {
            store,
            keys,
            concurrency: DEFAULT_DECRYPT_CONCURRENCY,
            per_item_timeout: Duration::from_millis(DEFAULT_DECRYPT_TIMEOUT_MS),
        }
    }

    pub fn from_config(
        store: Arc<dyn SubmissionStore>,
        keys: Arc<dyn KeyProvider>,
        config: &DecryptConfig,
    ) -> Self {
        Self::new(store, keys).with_limits(config.concurrency, config.timeout())
    }

    pub fn with_limits(mut self, concurrency: usize, per_item_timeout: Duration) -> Self {
        self.concurrency = concurrency.max(1);
        self.per_item_timeout = per_item_timeout;
        self
    }

    pub async fn decrypt_submission(&self, id: &str) -> Result<DecryptedView> {
        let submission = self.store.get(id).await?;
        self.decrypt_record(&submission).await
    }

    /// Decrypt an already-fetched record
    pub async fn decrypt_record(&self, submission: &Submission) -> Result<DecryptedView> {
        let plaintext = self
            .keys
            .decrypt(&SealedPayload::of(submission))
            .await
            .inspect_err(|e| log_failure(&submission.id, e))?;
        let payload = decode_payload(&plaintext).inspect_err(|e| log_failure(&submission.id, e))?;
        debug!(id = %submission.id, "Submission decrypted");
        Ok(DecryptedView {
            id: submission.id.clone(),
            submitted_at: submission.submitted_at,
            payload,
        })
    }

    pub async fn batch_decrypt(&self, ids: &[String]) -> BatchDecryptReport {
        let results = stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let outcome = tokio::time::timeout(self.per_item_timeout, self.decrypt_submission(&id))
                    .await
                    .unwrap_or_else(|_| {
                        warn!(id = %id, timeout_ms = self.per_item_timeout.as_millis() as u64, "Decrypt timed out");
                        Err(VaultError::upstream("decrypt", "timed out"))
                    });
                (id, outcome)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;
        let report = BatchDecryptReport::from_results(results);
        info!(
            total = report.total,
            succeeded = report.success_count,
            failed = report.failure_count,
            "Batch decrypt finished"
        );
        report
    }

    /// Decrypt every stored submission matching `filter`
    pub async fn decrypt_all(&self, filter: &SubmissionFilter) -> Result<BatchDecryptReport> {
        let ids: Vec<String> = self
            .store
            .list(filter)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        Ok(self.batch_decrypt(&ids).await)
    }
}

fn log_failure(id: &str, err: &VaultError) {
    match err.kind() {
        ErrorKind::AuthenticationFailure => {
            warn!(target: "security", id = %id, "Ciphertext failed authentication");
        }
        ErrorKind::UpstreamService | ErrorKind::Internal => {
            error!(id = %id, error = %err, "Decrypt failed");
        }
        kind => warn!(id = %id, kind = %kind, "Decrypt failed"),
    }
}
