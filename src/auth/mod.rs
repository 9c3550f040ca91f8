// src/auth/mod.rs
//! Admin authorization gate
//!
//! Two independent checks guard every admin operation:
//! - `rate_limit(caller)`: sliding-window ceiling per caller identity
//! - `authenticate(credential)`: bearer secret comparison
//!
//! The configured secret is kept only as its SHA-256 digest. Candidates are
//! hashed the same way and compared with `subtle`, so neither length nor a
//! matching prefix shows up in timing.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::AdminConfig;
use crate::error::{Result, VaultError};

pub mod rate_limit;

pub use rate_limit::{Clock, ManualClock, SlidingWindowRateLimiter, SystemClock};

/// Proof that a caller passed both checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    pub caller_id: String,
}

pub struct AuthorizationGate {
    secret_digest: Option<[u8; 32]>,
    limiter: Arc<SlidingWindowRateLimiter>,
}

impl AuthorizationGate {
    /// An empty or missing secret leaves admin access unavailable
    pub fn new(secret: Option<&str>, limiter: Arc<SlidingWindowRateLimiter>) -> Self {
        let secret_digest = secret.filter(|s| !s.is_empty()).map(digest);
        if secret_digest.is_none() {
            warn!("No admin secret configured; admin operations will report unavailable");
        }
        Self {
            secret_digest,
            limiter,
        }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        let limiter = SlidingWindowRateLimiter::new(config.rate_limit_max, config.rate_limit_window());
        Self::new(config.secret.as_deref(), Arc::new(limiter))
    }

    pub fn limiter(&self) -> &SlidingWindowRateLimiter {
        &self.limiter
    }

    pub fn rate_limit(&self, caller_id: &str) -> Result<()> {
        self.limiter.check(caller_id).inspect_err(|e| {
            warn!(target: "security", caller = %caller_id, error = %e, "Admin request rate limited");
        })
    }

    pub fn authenticate(&self, caller_id: &str, credential: Option<&str>) -> Result<AdminPrincipal> {
        let Some(expected) = self.secret_digest.as_ref() else {
            return Err(VaultError::ServiceUnavailable("admin secret"));
        };
        let Some(credential) = credential.filter(|c| !c.is_empty()) else {
            warn!(target: "security", caller = %caller_id, "Admin request without credential");
            return Err(VaultError::Unauthorized);
        };
        let candidate = digest(credential);
        if bool::from(candidate.as_slice().ct_eq(expected.as_slice())) {
            Ok(AdminPrincipal {
                caller_id: caller_id.to_string(),
            })
        } else {
            warn!(
                target: "security",
                caller = %caller_id,
                credential_len = credential.len(),
                "Admin credential rejected"
            );
            Err(VaultError::Forbidden)
        }
    }

    /// Rate limit first so failed credential guesses are counted too
    pub fn authorize(&self, caller_id: &str, credential: Option<&str>) -> Result<AdminPrincipal> {
        self.rate_limit(caller_id)?;
        self.authenticate(caller_id, credential)
    }
}

/// Pick the credential from `Authorization: Bearer …` or a query parameter.
/// The header wins when both are present.
pub fn bearer_token<'a>(
    authorization_header: Option<&'a str>,
    query_token: Option<&'a str>,
) -> Option<&'a str> {
    let from_header = authorization_header.and_then(|h| {
        let (scheme, token) = h.trim().split_once(' ')?;
        scheme
            .eq_ignore_ascii_case("bearer")
            .then(|| token.trim())
            .filter(|t| !t.is_empty())
    });
    from_header.or_else(|| query_token.map(str::trim).filter(|t| !t.is_empty()))
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}
