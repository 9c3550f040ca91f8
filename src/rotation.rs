// src/rotation.rs
//! Key rotation for stored submissions
//!
//! Every record not sealed under the provider's active key is decrypted with
//! the key it names and re-sealed under the active one. Each record is its own
//! unit: one failure is reported and the sweep moves on.

use serde::Serialize;
use tracing::{info, warn};

use crate::decrypt::BatchFailure;
use crate::error::Result;
use crate::keys::{KeyProvider, SealedPayload};
use crate::store::SubmissionStore;
use crate::submission::{Submission, SubmissionFilter};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationReport {
    pub active_key_id: String,
    pub examined: usize,
    pub rotated: usize,
    pub skipped: usize,
    pub failures: Vec<BatchFailure>,
}

pub async fn rotate_submissions(
    store: &dyn SubmissionStore,
    keys: &dyn KeyProvider,
) -> Result<RotationReport> {
    let active = keys.active_key_id().await?;
    let submissions = store.list(&SubmissionFilter::all()).await?;
    let mut report = RotationReport {
        active_key_id: active.clone(),
        examined: submissions.len(),
        ..RotationReport::default()
    };

    for submission in &submissions {
        if submission.key_id.as_deref() == Some(active.as_str()) {
            report.skipped += 1;
            continue;
        }
        match reseal_one(store, keys, submission).await {
            Ok(()) => report.rotated += 1,
            Err(e) => {
                warn!(id = %submission.id, error = %e, "Rotation failed for submission");
                report.failures.push(BatchFailure {
                    id: submission.id.clone(),
                    reason: e.kind(),
                    message: e.to_body().message,
                });
            }
        }
    }

    info!(
        key_id = %report.active_key_id,
        examined = report.examined,
        rotated = report.rotated,
        failed = report.failures.len(),
        "Key rotation sweep complete"
    );
    Ok(report)
}

async fn reseal_one(
    store: &dyn SubmissionStore,
    keys: &dyn KeyProvider,
    submission: &Submission,
) -> Result<()> {
    let plaintext = keys.decrypt(&SealedPayload::of(submission)).await?;
    let sealed = keys.encrypt(plaintext.expose_secret()).await?;
    store.reseal(&submission.id, &sealed).await?;
    Ok(())
}
