// src/error.rs
//! Public error type for the entire crate
//!
//! Every failure a caller can observe is a `VaultError`. Its `kind()` is the
//! stable, machine-readable classification; `to_body()` is the only shape that
//! should ever leave the process.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Admin credential missing")]
    Unauthorized,

    #[error("Admin credential rejected")]
    Forbidden,

    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Submission not found: {0}")]
    NotFound(String),

    #[error("Authentication tag did not verify")]
    AuthenticationFailure,

    #[error("Decrypted payload is malformed: {0}")]
    MalformedPayload(String),

    #[error("{service} error: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("{0} is not configured")]
    ServiceUnavailable(&'static str),

    /// The record names a key this deployment has never held. Bad data, not an outage.
    #[error("Submission sealed under unknown key {0}")]
    UnknownKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    RateLimited,
    NotFound,
    AuthenticationFailure,
    MalformedPayload,
    UpstreamService,
    ServiceUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AuthenticationFailure => "authentication_failure",
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::UpstreamService => "upstream_service",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Internal => "internal",
        }
    }

    /// Status code a transport layer should answer with
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::UpstreamService | ErrorKind::ServiceUnavailable => 503,
            ErrorKind::AuthenticationFailure
            | ErrorKind::MalformedPayload
            | ErrorKind::Internal => 500,
        }
    }

    /// Transient failures a caller may retry with backoff
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::UpstreamService | ErrorKind::ServiceUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Validation(_) => ErrorKind::Validation,
            VaultError::Unauthorized => ErrorKind::Unauthorized,
            VaultError::Forbidden => ErrorKind::Forbidden,
            VaultError::RateLimited { .. } => ErrorKind::RateLimited,
            VaultError::NotFound(_) => ErrorKind::NotFound,
            VaultError::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            VaultError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            VaultError::Upstream { .. } | VaultError::Io(_) | VaultError::Sql(_) => {
                ErrorKind::UpstreamService
            }
            VaultError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            VaultError::UnknownKey(_)
            | VaultError::Config(_)
            | VaultError::Serialization(_)
            | VaultError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a single-field validation failure
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        VaultError::Validation(ValidationErrors(vec![FieldError::new(field, message)]))
    }

    pub(crate) fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        VaultError::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Caller-facing representation. Infrastructure detail never leaves the process.
    pub fn to_body(&self) -> ErrorBody {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::UpstreamService => {
                "A backing service is unavailable, retry later".to_string()
            }
            ErrorKind::Internal => "Internal error".to_string(),
            ErrorKind::AuthenticationFailure => {
                "Stored ciphertext failed authentication".to_string()
            }
            ErrorKind::MalformedPayload => "Decrypted payload could not be parsed".to_string(),
            _ => self.to_string(),
        };
        ErrorBody {
            kind,
            message,
            retry_after_secs: match self {
                VaultError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
                _ => None,
            },
            errors: match self {
                VaultError::Validation(errors) => errors.0.clone(),
                _ => Vec::new(),
            },
        }
    }
}

/// Wire shape of an error response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// One field-level validation problem, e.g. `gpa must be between 0 and 4.0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(VaultError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}
