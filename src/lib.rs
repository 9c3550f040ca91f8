// src/lib.rs
//! submission-vault: confidential submission pipeline
//!
//! Features:
//! - AES-256-GCM sealing with a fresh 96-bit nonce per call
//! - Local or remote-managed (AWS KMS) key providers behind one trait
//! - SQLite or JSON-file submission stores with atomic, durable writes
//! - Rate-limited, constant-time admin authorization
//! - Concurrent batch decryption with per-id failure reporting
//! - Index-field insights, CSV/JSON export and key rotation

pub mod admin;
pub mod aliases;
pub mod analytics;
pub mod app;
pub mod auth;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod decrypt;
pub mod encoding;
pub mod enums;
pub mod error;
pub mod export;
pub mod intake;
pub mod keys;
pub mod rotation;
pub mod store;
pub mod submission;

// Re-export everything users need at the crate root
pub use admin::{AdminRequest, AdminService, BatchDecryptRequest, DecryptedInsights};
pub use aliases::{DataKey32, PlainText, SecureConversionsExt, SecureRandomExt};
pub use analytics::{compute_insights, Analyzable, GpaDistribution, Insights};
pub use app::App;
pub use auth::{AdminPrincipal, AuthorizationGate, SlidingWindowRateLimiter};
pub use config::Config;
pub use decrypt::{BatchDecryptReport, BatchFailure, DecryptionOrchestrator};
pub use enums::{ExportFormat, KeyProviderKind, StoreBackend};
pub use error::{ErrorBody, ErrorKind, FieldError, Result, ValidationErrors, VaultError};
pub use intake::{IndexFieldsInput, IntakeService, SubmissionReceipt, SubmissionRequest};
pub use keys::{
    build_key_provider, KeyProvider, LocalStaticKeyProvider, RemoteManagedKeyProvider,
    SealedPayload, UnavailableKeyProvider,
};
pub use rotation::{rotate_submissions, RotationReport};
pub use store::{open_store, SubmissionStore};
pub use submission::{
    Attachment, DecryptedView, IndexFields, IndexFieldsPatch, NewSubmission, SafeView, Submission,
    SubmissionFilter, SubmissionPayload,
};
