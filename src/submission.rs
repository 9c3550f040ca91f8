// src/submission.rs
//! Submission data model
//!
//! A `Submission` is what the store persists: opaque ciphertext, its nonce,
//! the key it was sealed under, and a handful of plaintext index fields kept
//! in the clear so listing and filtering never need a decrypt.
//!
//! A `DecryptedView` is the admin-only projection after decryption. It is
//! built per request and never written back.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::consts::{GPA_MAX, GPA_MIN, MAX_INDEX_FIELD_CHARS};
use crate::crypto::Nonce96;
use crate::encoding::b64_encode;
use crate::error::{Result, ValidationErrors};

/// Persisted record. Callers always receive copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    #[serde(with = "crate::encoding::b64_bytes")]
    pub ciphertext: Vec<u8>,
    pub nonce: Nonce96,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub index: IndexFields,
}

/// Everything `create` needs; id and timestamp are assigned by the store
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub ciphertext: Vec<u8>,
    pub nonce: Nonce96,
    pub key_id: Option<String>,
    pub index: IndexFields,
}

/// Plaintext index fields. Intentionally not encrypted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
}

impl IndexFields {
    /// Field-level checks shared by the boundary and the store
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::default();
        self.collect_errors(&mut errors);
        errors.into_result()
    }

    pub(crate) fn collect_errors(&self, errors: &mut ValidationErrors) {
        if let Some(gpa) = self.gpa {
            if let Err(message) = check_gpa(gpa) {
                errors.push("gpa", message);
            }
        }
        for (field, value) in self.text_fields() {
            if let Some(value) = value {
                if value.chars().count() > MAX_INDEX_FIELD_CHARS {
                    errors.push(
                        field,
                        format!("{field} must be at most {MAX_INDEX_FIELD_CHARS} characters"),
                    );
                }
            }
        }
        if let Some(email) = &self.email {
            if !looks_like_email(email) {
                errors.push("email", "email must be a valid address");
            }
        }
    }

    fn text_fields(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("course", self.course.as_deref()),
            ("department", self.department.as_deref()),
            ("name", self.name.as_deref()),
            ("email", self.email.as_deref()),
            ("phone", self.phone.as_deref()),
            ("documentName", self.document_name.as_deref()),
        ]
    }
}

/// Partial update of index fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFieldsPatch {
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub document_name: Option<String>,
}

impl IndexFieldsPatch {
    pub fn is_empty(&self) -> bool {
        *self == IndexFieldsPatch::default()
    }

    /// Apply onto a copy of `base`
    pub fn apply(&self, base: &IndexFields) -> IndexFields {
        IndexFields {
            course: self.course.clone().or_else(|| base.course.clone()),
            department: self.department.clone().or_else(|| base.department.clone()),
            gpa: self.gpa.or(base.gpa),
            name: self.name.clone().or_else(|| base.name.clone()),
            email: self.email.clone().or_else(|| base.email.clone()),
            phone: self.phone.clone().or_else(|| base.phone.clone()),
            document_name: self
                .document_name
                .clone()
                .or_else(|| base.document_name.clone()),
        }
    }
}

/// Listing filters; all conditions must hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFilter {
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub min_gpa: Option<f64>,
    #[serde(default)]
    pub max_gpa: Option<f64>,
    #[serde(default)]
    pub submitted_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SubmissionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        let index = &submission.index;
        if let Some(dept) = &self.department {
            if index.department.as_deref() != Some(dept.as_str()) {
                return false;
            }
        }
        if let Some(course) = &self.course {
            if index.course.as_deref() != Some(course.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_gpa {
            if !index.gpa.is_some_and(|g| g >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_gpa {
            if !index.gpa.is_some_and(|g| g <= max) {
                return false;
            }
        }
        if let Some(after) = self.submitted_after {
            if submission.submitted_at <= after {
                return false;
            }
        }
        true
    }
}

/// Payload keys that would collide with `DecryptedView` metadata
pub const RESERVED_PAYLOAD_FIELDS: [&str; 3] = ["id", "submittedAt", "attachments"];

/// Structured plaintext recovered from a submission
///
/// Producer fields are kept as a JSON object so they round-trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SubmissionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insert
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// GPA whether the producer sent it as a number or a string.
    /// Out-of-range values count as absent either way.
    pub fn gpa(&self) -> Option<f64> {
        match self.fields.get("gpa")? {
            Value::Number(n) => n.as_f64().filter(|g| check_gpa(*g).is_ok()),
            Value::String(s) => parse_gpa(s).ok(),
            _ => None,
        }
    }

    /// First producer field shadowing view metadata, if any
    pub fn reserved_field(&self) -> Option<&'static str> {
        RESERVED_PAYLOAD_FIELDS
            .into_iter()
            .find(|name| self.fields.contains_key(*name))
    }
}

/// File attached to a submission (inside the ciphertext)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub document_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(with = "crate::encoding::b64_bytes")]
    pub data: Vec<u8>,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

/// Decrypted submission merged with its public metadata.
/// Never carries ciphertext or nonce.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedView {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: SubmissionPayload,
}

/// Non-admin listing entry: metadata, index fields, opaque base64 ciphertext
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeView {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub index_fields: IndexFields,
    pub ciphertext: String,
    pub nonce: String,
}

impl From<&Submission> for SafeView {
    fn from(s: &Submission) -> Self {
        Self {
            id: s.id.clone(),
            submitted_at: s.submitted_at,
            updated_at: s.updated_at,
            index_fields: s.index.clone(),
            ciphertext: b64_encode(&s.ciphertext),
            nonce: s.nonce.to_base64(),
        }
    }
}

/// Parse a GPA given as text, e.g. `"3.9"`
pub fn parse_gpa(text: &str) -> std::result::Result<f64, String> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| "gpa must be a number".to_string())?;
    check_gpa(value)?;
    Ok(value)
}

fn check_gpa(value: f64) -> std::result::Result<(), String> {
    if !value.is_finite() || !(GPA_MIN..=GPA_MAX).contains(&value) {
        return Err("gpa must be between 0 and 4.0".to_string());
    }
    Ok(())
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !value.contains(' ')
}

/// UTC calendar day of a timestamp
pub(crate) fn day_of(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}
