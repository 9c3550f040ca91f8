// tests/support.rs
//! Fixtures shared by the integration tests: stores, key providers, payloads

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use submission_vault::aliases::{DataKey32, PlainText};
use submission_vault::crypto::{generate_key, open_with_aad, seal_with_aad, Nonce96};
use submission_vault::encoding::b64_encode;
use submission_vault::enums::{KeyProviderKind, StoreBackend};
use submission_vault::error::{Result, VaultError};
use submission_vault::intake::SubmissionRequest;
use submission_vault::keys::{
    CustodyError, EncryptionContext, KeyCustody, KeyProvider, LocalStaticKeyProvider,
    SealedPayload,
};
use submission_vault::store::{FileStore, SqliteStore, SubmissionStore};
use submission_vault::submission::{IndexFields, NewSubmission, SubmissionPayload};
use submission_vault::Config;
use tempfile::TempDir;

pub const ADMIN_SECRET: &str = "correct horse battery staple";
pub const CALLER: &str = "203.0.113.7";

pub fn local_keys() -> Arc<LocalStaticKeyProvider> {
    Arc::new(LocalStaticKeyProvider::new(generate_key()))
}

pub async fn sqlite_store(dir: &TempDir) -> Arc<dyn SubmissionStore> {
    Arc::new(
        SqliteStore::open(&dir.path().join("submissions.db"))
            .await
            .expect("open sqlite store"),
    )
}

pub async fn file_store(dir: &TempDir) -> Arc<dyn SubmissionStore> {
    Arc::new(
        FileStore::open(&dir.path().join("records"))
            .await
            .expect("open file store"),
    )
}

pub async fn store_for(backend: StoreBackend, dir: &TempDir) -> Arc<dyn SubmissionStore> {
    match backend {
        StoreBackend::Sqlite => sqlite_store(dir).await,
        _ => file_store(dir).await,
    }
}

pub const BACKENDS: [StoreBackend; 2] = [StoreBackend::Sqlite, StoreBackend::JsonFiles];

/// Config pointing at a temp SQLite file with a known admin secret
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.store.path = dir.path().join("app.db");
    config.admin.secret = Some(ADMIN_SECRET.to_string());
    config.decrypt.timeout_ms = 2_000;
    config
}

pub fn ada_payload() -> SubmissionPayload {
    SubmissionPayload::new()
        .with_field("name", "Ada")
        .with_field("gpa", "3.9")
        .with_field("course", "CS")
        .with_field("department", "Eng")
}

pub fn student_payload(name: &str, dept: &str, gpa: f64) -> SubmissionPayload {
    SubmissionPayload::new()
        .with_field("name", name)
        .with_field("department", dept)
        .with_field("course", "CS")
        .with_field("gpa", gpa)
}

/// Index-only record with random bytes standing in for ciphertext
pub fn raw_submission(department: &str, gpa: Option<f64>) -> NewSubmission {
    NewSubmission {
        ciphertext: vec![0xAB; 48],
        nonce: Nonce96::generate(),
        key_id: Some("test-key".into()),
        index: IndexFields {
            department: Some(department.into()),
            course: Some("CS".into()),
            gpa,
            ..IndexFields::default()
        },
    }
}

/// Seal `payload` with `keys` and return the store input
pub async fn sealed_submission(keys: &dyn KeyProvider, payload: &SubmissionPayload) -> NewSubmission {
    let bytes = serde_json::to_vec(payload).unwrap();
    let sealed = keys.encrypt(&bytes).await.unwrap();
    NewSubmission {
        ciphertext: sealed.ciphertext,
        nonce: sealed.nonce,
        key_id: sealed.key_id,
        index: IndexFields {
            department: payload.field_str("department").map(str::to_string),
            course: payload.field_str("course").map(str::to_string),
            gpa: payload.gpa(),
            name: payload.field_str("name").map(str::to_string),
            ..IndexFields::default()
        },
    }
}

/// A syntactically valid creation request (random bytes, not real ciphertext)
pub fn request_with_gpa(gpa: &str) -> SubmissionRequest {
    serde_json::from_value(serde_json::json!({
        "ciphertext": b64_encode(&[7u8; 40]),
        "nonce": b64_encode(Nonce96::generate().as_bytes()),
        "indexFields": { "course": "CS", "department": "Eng", "gpa": gpa }
    }))
    .unwrap()
}

/// Counts calls on the way through to a real provider
pub struct CountingKeyProvider {
    inner: Arc<dyn KeyProvider>,
    pub encrypts: AtomicUsize,
    pub decrypts: AtomicUsize,
}

impl CountingKeyProvider {
    pub fn new(inner: Arc<dyn KeyProvider>) -> Self {
        Self {
            inner,
            encrypts: AtomicUsize::new(0),
            decrypts: AtomicUsize::new(0),
        }
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyProvider for CountingKeyProvider {
    fn kind(&self) -> KeyProviderKind {
        self.inner.kind()
    }

    async fn active_key_id(&self) -> Result<String> {
        self.inner.active_key_id().await
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<SealedPayload> {
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt(plaintext).await
    }

    async fn decrypt(&self, sealed: &SealedPayload) -> Result<PlainText> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(sealed).await
    }
}

/// Delays decryption of one specific nonce and tracks peak concurrency
pub struct SlowKeyProvider {
    inner: Arc<dyn KeyProvider>,
    slow_nonce: Mutex<Option<Nonce96>>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl SlowKeyProvider {
    pub fn new(inner: Arc<dyn KeyProvider>, delay: Duration) -> Self {
        Self {
            inner,
            slow_nonce: Mutex::new(None),
            delay,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Only this nonce is slow; `None` makes every decrypt slow
    pub fn slow_on(&self, nonce: Option<Nonce96>) {
        *self.slow_nonce.lock() = nonce;
    }
}

#[async_trait]
impl KeyProvider for SlowKeyProvider {
    fn kind(&self) -> KeyProviderKind {
        self.inner.kind()
    }

    async fn active_key_id(&self) -> Result<String> {
        self.inner.active_key_id().await
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<SealedPayload> {
        self.inner.encrypt(plaintext).await
    }

    async fn decrypt(&self, sealed: &SealedPayload) -> Result<PlainText> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let slow = match *self.slow_nonce.lock() {
            Some(n) => n == sealed.nonce,
            None => true,
        };
        if slow {
            tokio::time::sleep(self.delay).await;
        }
        let out = self.inner.decrypt(sealed).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

/// Key custody service living in memory: AES-GCM with the context as AAD
pub struct InMemoryCustody {
    aliases: HashMap<String, String>,
    keys: HashMap<String, DataKey32>,
    pub resolves: AtomicUsize,
    pub unavailable: AtomicBool,
    pub deny: AtomicBool,
}

impl InMemoryCustody {
    pub fn with_key(alias: &str) -> Self {
        let handle = format!("arn:test:key/{}", alias.trim_start_matches("alias/"));
        let mut aliases = HashMap::new();
        aliases.insert(alias.to_string(), handle.clone());
        let mut keys = HashMap::new();
        keys.insert(handle, generate_key());
        Self {
            aliases,
            keys,
            resolves: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            deny: AtomicBool::new(false),
        }
    }

    fn check_reachable(&self) -> std::result::Result<(), CustodyError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CustodyError::Unavailable("connection refused".into()));
        }
        if self.deny.load(Ordering::SeqCst) {
            return Err(CustodyError::Unauthorized("not allowed".into()));
        }
        Ok(())
    }

    fn key(&self, handle: &str) -> std::result::Result<&DataKey32, CustodyError> {
        self.keys
            .get(handle)
            .ok_or_else(|| CustodyError::NotFound(handle.to_string()))
    }
}

fn context_aad(context: &EncryptionContext) -> Vec<u8> {
    serde_json::to_vec(context).unwrap()
}

#[async_trait]
impl KeyCustody for InMemoryCustody {
    async fn resolve_key(&self, key_name: &str) -> std::result::Result<String, CustodyError> {
        self.check_reachable()?;
        self.resolves.fetch_add(1, Ordering::SeqCst);
        self.aliases
            .get(key_name)
            .cloned()
            .ok_or_else(|| CustodyError::NotFound(key_name.to_string()))
    }

    async fn encrypt(
        &self,
        key_handle: &str,
        plaintext: &[u8],
        context: &EncryptionContext,
    ) -> std::result::Result<Vec<u8>, CustodyError> {
        self.check_reachable()?;
        let key = self.key(key_handle)?;
        let (ct, nonce) = seal_with_aad(plaintext, &context_aad(context), key)
            .map_err(|e| CustodyError::Unavailable(e.to_string()))?;
        let mut blob = nonce.as_bytes().to_vec();
        blob.extend_from_slice(&ct);
        Ok(blob)
    }

    async fn decrypt(
        &self,
        key_handle: &str,
        ciphertext: &[u8],
        context: &EncryptionContext,
    ) -> std::result::Result<Vec<u8>, CustodyError> {
        self.check_reachable()?;
        let key = self.key(key_handle)?;
        if ciphertext.len() < 12 {
            return Err(CustodyError::InvalidCiphertext);
        }
        let (nonce, ct) = ciphertext.split_at(12);
        let nonce = Nonce96::try_from(nonce).map_err(|_| CustodyError::InvalidCiphertext)?;
        match open_with_aad(ct, &nonce, &context_aad(context), key) {
            Ok(pt) => Ok(pt.expose_secret().clone()),
            Err(VaultError::AuthenticationFailure) => Err(CustodyError::InvalidCiphertext),
            Err(e) => Err(CustodyError::Unavailable(e.to_string())),
        }
    }
}

/// Flip one bit in place
pub fn flip_bit(bytes: &mut [u8], bit: usize) {
    bytes[bit / 8] ^= 1 << (bit % 8);
}
