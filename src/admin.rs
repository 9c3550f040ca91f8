// src/admin.rs
//! Admin operations
//!
//! Every entry point runs the same pipeline: rate limit the caller, check the
//! bearer credential, then perform the operation. A request that fails either
//! check never reaches the store or the key provider.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analytics::{compute_insights, Insights};
use crate::auth::{bearer_token, AdminPrincipal, AuthorizationGate};
use crate::config::Config;
use crate::decrypt::{BatchDecryptReport, DecryptionOrchestrator};
use crate::enums::ExportFormat;
use crate::error::{Result, VaultError};
use crate::export::{render, ExportDocument};
use crate::keys::KeyProvider;
use crate::rotation::{rotate_submissions, RotationReport};
use crate::store::SubmissionStore;
use crate::submission::{DecryptedView, IndexFieldsPatch, SafeView, SubmissionFilter};

/// Who is asking, and with what credential
#[derive(Clone, PartialEq, Eq)]
pub struct AdminRequest {
    pub caller_id: String,
    pub credential: Option<String>,
}

impl AdminRequest {
    pub fn new(caller_id: impl Into<String>, credential: Option<&str>) -> Self {
        Self {
            caller_id: caller_id.into(),
            credential: credential.map(str::to_string),
        }
    }

    /// From an `Authorization` header and/or a `token` query parameter
    pub fn from_transport(
        caller_id: impl Into<String>,
        authorization_header: Option<&str>,
        query_token: Option<&str>,
    ) -> Self {
        Self::new(caller_id, bearer_token(authorization_header, query_token))
    }
}

impl std::fmt::Debug for AdminRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminRequest")
            .field("caller_id", &self.caller_id)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchDecryptRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Insights over decrypted payloads, plus how many records could not be read
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedInsights {
    pub insights: Insights,
    pub decrypt_failures: usize,
}

pub struct AdminService {
    gate: AuthorizationGate,
    store: Arc<dyn SubmissionStore>,
    keys: Arc<dyn KeyProvider>,
    orchestrator: DecryptionOrchestrator,
    recent_window: chrono::Duration,
}

impl AdminService {
    pub fn new(
        gate: AuthorizationGate,
        store: Arc<dyn SubmissionStore>,
        keys: Arc<dyn KeyProvider>,
        orchestrator: DecryptionOrchestrator,
        recent_window: chrono::Duration,
    ) -> Self {
        Self {
            gate,
            store,
            keys,
            orchestrator,
            recent_window,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn SubmissionStore>,
        keys: Arc<dyn KeyProvider>,
    ) -> Self {
        let orchestrator =
            DecryptionOrchestrator::from_config(Arc::clone(&store), Arc::clone(&keys), &config.decrypt);
        Self::new(
            AuthorizationGate::from_config(&config.admin),
            store,
            keys,
            orchestrator,
            config.analytics.recent_window(),
        )
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    fn authorize(&self, request: &AdminRequest, operation: &'static str) -> Result<AdminPrincipal> {
        let principal = self
            .gate
            .authorize(&request.caller_id, request.credential.as_deref())?;
        info!(target: "audit", caller = %principal.caller_id, operation, "Admin operation");
        Ok(principal)
    }

    pub async fn decrypt(&self, request: &AdminRequest, id: &str) -> Result<DecryptedView> {
        self.authorize(request, "decrypt")?;
        self.orchestrator.decrypt_submission(id).await
    }

    pub async fn batch_decrypt(
        &self,
        request: &AdminRequest,
        batch: &BatchDecryptRequest,
    ) -> Result<BatchDecryptReport> {
        self.authorize(request, "batch_decrypt")?;
        if batch.ids.is_empty() {
            return Err(VaultError::invalid_field("ids", "ids must be a non-empty list"));
        }
        Ok(self.orchestrator.batch_decrypt(&batch.ids).await)
    }

    pub async fn list(
        &self,
        request: &AdminRequest,
        filter: &SubmissionFilter,
    ) -> Result<Vec<SafeView>> {
        self.authorize(request, "list")?;
        let submissions = self.store.list(filter).await?;
        Ok(submissions.iter().map(SafeView::from).collect())
    }

    pub async fn export(
        &self,
        request: &AdminRequest,
        format: ExportFormat,
    ) -> Result<ExportDocument> {
        self.authorize(request, "export")?;
        let submissions = self.store.list(&SubmissionFilter::all()).await?;
        render(format, &submissions, Utc::now())
    }

    /// Index-field insights; nothing is decrypted
    pub async fn insights(
        &self,
        request: &AdminRequest,
        filter: &SubmissionFilter,
    ) -> Result<Insights> {
        self.authorize(request, "insights")?;
        let submissions = self.store.list(filter).await?;
        Ok(compute_insights(&submissions, Utc::now(), self.recent_window))
    }

    /// Insights over decrypted payloads, for fields the index does not carry
    pub async fn decrypted_insights(
        &self,
        request: &AdminRequest,
        filter: &SubmissionFilter,
    ) -> Result<DecryptedInsights> {
        self.authorize(request, "decrypted_insights")?;
        let report = self.orchestrator.decrypt_all(filter).await?;
        Ok(DecryptedInsights {
            insights: compute_insights(&report.successes, Utc::now(), self.recent_window),
            decrypt_failures: report.failure_count,
        })
    }

    pub async fn update(
        &self,
        request: &AdminRequest,
        id: &str,
        patch: &IndexFieldsPatch,
    ) -> Result<SafeView> {
        self.authorize(request, "update")?;
        let updated = self.store.update(id, patch).await?;
        Ok(SafeView::from(&updated))
    }

    pub async fn delete(&self, request: &AdminRequest, id: &str) -> Result<bool> {
        self.authorize(request, "delete")?;
        self.store.delete(id).await
    }

    pub async fn rotate(&self, request: &AdminRequest) -> Result<RotationReport> {
        self.authorize(request, "rotate")?;
        rotate_submissions(self.store.as_ref(), self.keys.as_ref()).await
    }
}
