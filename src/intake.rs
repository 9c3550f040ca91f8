// src/intake.rs
//! Submission intake boundary
//!
//! Translates the transport shape (`ciphertext`/`nonce` as base64, loosely
//! typed index fields) into a validated [`NewSubmission`], collecting every
//! field problem in one pass. Also hosts the producer-side helper that seals a
//! payload into that transport shape.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consts::NONCE_LEN;
use crate::crypto::{encode_payload, Nonce96};
use crate::encoding::{b64_decode, b64_encode};
use crate::error::{Result, ValidationErrors, VaultError};
use crate::keys::KeyProvider;
use crate::store::SubmissionStore;
use crate::submission::{IndexFields, NewSubmission, SafeView, SubmissionFilter, SubmissionPayload};

/// Creation request as it arrives from a producer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    #[serde(default)]
    pub ciphertext: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_fields: Option<IndexFieldsInput>,
}

/// Index fields before validation. GPA may be a number or a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFieldsInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<GpaInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GpaInput {
    Number(f64),
    Text(String),
}

impl IndexFieldsInput {
    /// Pull the indexable fields out of a payload the producer is about to seal
    pub fn from_payload(payload: &SubmissionPayload) -> Self {
        let text = |name: &str| payload.field_str(name).map(str::to_string);
        let gpa = match payload.fields.get("gpa") {
            Some(serde_json::Value::Number(n)) => n.as_f64().map(GpaInput::Number),
            Some(serde_json::Value::String(s)) => Some(GpaInput::Text(s.clone())),
            _ => None,
        };
        Self {
            course: text("course"),
            department: text("department"),
            gpa,
            name: text("name"),
            email: text("email"),
            phone: text("phone"),
            document_name: text("documentName")
                .or_else(|| payload.attachments.first().map(|a| a.document_name.clone())),
        }
    }

    fn into_index(self, errors: &mut ValidationErrors) -> IndexFields {
        let gpa = match self.gpa {
            None => None,
            Some(GpaInput::Number(n)) => Some(n),
            Some(GpaInput::Text(t)) if t.trim().is_empty() => None,
            Some(GpaInput::Text(t)) => match t.trim().parse::<f64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    errors.push("gpa", "gpa must be a number");
                    None
                }
            },
        };
        let index = IndexFields {
            course: non_blank(self.course),
            department: non_blank(self.department),
            gpa,
            name: non_blank(self.name),
            email: non_blank(self.email),
            phone: non_blank(self.phone),
            document_name: non_blank(self.document_name),
        };
        index.collect_errors(errors);
        index
    }
}

impl SubmissionRequest {
    /// Decode and validate, reporting every bad field at once
    pub fn validate(self) -> Result<NewSubmission> {
        let mut errors = ValidationErrors::default();

        let ciphertext = match self.ciphertext.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push("ciphertext", "ciphertext is required");
                Vec::new()
            }
            Some(text) => b64_decode(text).unwrap_or_else(|_| {
                errors.push("ciphertext", "ciphertext must be base64");
                Vec::new()
            }),
        };

        let nonce = match self.nonce.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push("nonce", "nonce is required");
                None
            }
            Some(text) => match b64_decode(text) {
                Err(_) => {
                    errors.push("nonce", "nonce must be base64");
                    None
                }
                Ok(bytes) => Nonce96::try_from(bytes.as_slice())
                    .map_err(|_| {
                        errors.push("nonce", format!("nonce must be {NONCE_LEN} bytes"));
                    })
                    .ok(),
            },
        };

        let index = self
            .index_fields
            .unwrap_or_default()
            .into_index(&mut errors);

        errors.into_result()?;
        // A missing nonce always produced a field error above
        let Some(nonce) = nonce else {
            return Err(VaultError::invalid_field("nonce", "nonce is required"));
        };
        Ok(NewSubmission {
            ciphertext,
            nonce,
            key_id: non_blank(self.key_id),
            index,
        })
    }
}

/// Returned to the producer after a successful create
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
}

/// Producer side: serialize and seal a payload into a transport request
pub async fn seal_submission(
    keys: &dyn KeyProvider,
    payload: &SubmissionPayload,
    index: Option<IndexFieldsInput>,
) -> Result<SubmissionRequest> {
    let plaintext = encode_payload(payload)?;
    let sealed = keys.encrypt(plaintext.expose_secret()).await?;
    Ok(SubmissionRequest {
        ciphertext: Some(b64_encode(&sealed.ciphertext)),
        nonce: Some(sealed.nonce.to_base64()),
        key_id: sealed.key_id,
        index_fields: index,
    })
}

/// Non-admin operations: create and list
pub struct IntakeService {
    store: Arc<dyn SubmissionStore>,
    keys: Arc<dyn KeyProvider>,
}

impl IntakeService {
    pub fn new(store: Arc<dyn SubmissionStore>, keys: Arc<dyn KeyProvider>) -> Self {
        Self { store, keys }
    }

    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionReceipt> {
        let new = request.validate()?;
        if let Some(key_id) = new.key_id.as_deref() {
            if !self.keys.recognizes_key(key_id) {
                return Err(VaultError::invalid_field("keyId", "keyId names an unknown key"));
            }
        }
        let stored = self.store.create(new).await?;
        info!(id = %stored.id, "Submission accepted");
        Ok(SubmissionReceipt {
            id: stored.id,
            submitted_at: stored.submitted_at,
        })
    }

    /// Seal `payload` with the configured key provider and store it
    pub async fn submit_payload(
        &self,
        payload: &SubmissionPayload,
        index: Option<IndexFieldsInput>,
    ) -> Result<SubmissionReceipt> {
        let request = seal_submission(self.keys.as_ref(), payload, index).await?;
        debug!(attachments = payload.attachments.len(), "Payload sealed for intake");
        self.submit(request).await
    }

    /// Safe listing: index fields plus opaque base64 ciphertext
    pub async fn list(&self, filter: &SubmissionFilter) -> Result<Vec<SafeView>> {
        let submissions = self.store.list(filter).await?;
        Ok(submissions.iter().map(SafeView::from).collect())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
