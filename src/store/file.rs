// src/store/file.rs
//! Directory-of-JSON-documents submission store
//!
//! Layout: `<dir>/<id>.json`, one record per file. Every write goes to a
//! temp file in the same directory, is fsynced, then atomically renamed over
//! the target, followed by a directory fsync. Readers therefore see either the
//! old record or the new one, never a torn write.
//!
//! Writers of the same id are serialized through [`IdLocks`]; distinct ids
//! proceed in parallel.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::consts::NONCE_LEN;
use crate::enums::StoreBackend;
use crate::error::{Result, VaultError};
use crate::keys::SealedPayload;
use crate::submission::{IndexFieldsPatch, NewSubmission, Submission, SubmissionFilter};

use super::locks::IdLocks;
use super::{
    duplicate_nonce, is_valid_id, new_submission_id, sort_newest_first, validate_new,
    SubmissionStore,
};

const RECORD_EXT: &str = "json";

type NonceKey = (String, [u8; NONCE_LEN]);

pub struct FileStore {
    dir: Arc<PathBuf>,
    locks: IdLocks,
    nonces: Mutex<HashSet<NonceKey>>,
    closed: AtomicBool,
}

impl FileStore {
    /// Open `dir`, creating it if needed, and index the nonces already in use
    pub async fn open(dir: &Path) -> Result<Self> {
        let dir = Arc::new(dir.to_path_buf());
        let records = {
            let dir = Arc::clone(&dir);
            blocking(move || {
                fs::create_dir_all(dir.as_path())?;
                read_all(&dir)
            })
            .await?
        };
        let nonces = records.iter().map(nonce_key).collect::<HashSet<_>>();
        info!(
            dir = %dir.display(),
            records = records.len(),
            "File submission store ready"
        );
        Ok(Self {
            dir,
            locks: IdLocks::new(),
            nonces: Mutex::new(nonces),
            closed: AtomicBool::new(false),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VaultError::ServiceUnavailable("submission store"));
        }
        Ok(())
    }

    /// Claim a `(key_id, nonce)` pair; fails if another record holds it
    fn reserve_nonce(&self, key: NonceKey) -> Result<()> {
        if self.nonces.lock().insert(key) {
            Ok(())
        } else {
            Err(duplicate_nonce())
        }
    }

    fn release_nonce(&self, key: &NonceKey) {
        self.nonces.lock().remove(key);
    }

    async fn read(&self, id: &str) -> Result<Option<Submission>> {
        let dir = Arc::clone(&self.dir);
        let id = id.to_string();
        blocking(move || read_record(&record_path(&dir, &id))).await
    }

    async fn write(&self, submission: &Submission) -> Result<()> {
        let dir = Arc::clone(&self.dir);
        let bytes = serde_json::to_vec_pretty(submission)?;
        let target = record_path(&dir, &submission.id);
        blocking(move || write_atomic(&dir, &target, &bytes)).await
    }
}

#[async_trait]
impl SubmissionStore for FileStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::JsonFiles
    }

    async fn create(&self, new: NewSubmission) -> Result<Submission> {
        self.ensure_open()?;
        validate_new(&new)?;
        let submission = Submission {
            id: new_submission_id(),
            ciphertext: new.ciphertext,
            nonce: new.nonce,
            key_id: new.key_id,
            submitted_at: Utc::now(),
            updated_at: None,
            index: new.index,
        };
        let nonce = nonce_key(&submission);
        self.reserve_nonce(nonce.clone())?;
        if let Err(e) = self.write(&submission).await {
            self.release_nonce(&nonce);
            return Err(e);
        }
        debug!(
            id = %submission.id,
            ciphertext_len = submission.ciphertext.len(),
            "Submission stored"
        );
        Ok(submission)
    }

    async fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>> {
        self.ensure_open()?;
        let dir = Arc::clone(&self.dir);
        let mut all = blocking(move || read_all(&dir)).await?;
        all.retain(|s| filter.matches(s));
        sort_newest_first(&mut all);
        if let Some(limit) = filter.limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    async fn get(&self, id: &str) -> Result<Submission> {
        self.ensure_open()?;
        if !is_valid_id(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }
        self.read(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(id.to_string()))
    }

    async fn update(&self, id: &str, patch: &IndexFieldsPatch) -> Result<Submission> {
        self.ensure_open()?;
        if !is_valid_id(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }
        let _guard = self.locks.lock(id).await;
        let mut current = self
            .read(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        if patch.is_empty() {
            return Ok(current);
        }
        let index = patch.apply(&current.index);
        index.validate()?;
        current.index = index;
        current.updated_at = Some(Utc::now());
        self.write(&current).await?;
        Ok(current)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.ensure_open()?;
        if !is_valid_id(id) {
            return Ok(false);
        }
        let _guard = self.locks.lock(id).await;
        let Some(existing) = self.read(id).await? else {
            return Ok(false);
        };
        let dir = Arc::clone(&self.dir);
        let path = record_path(&dir, id);
        let removed = blocking(move || match fs::remove_file(&path) {
            Ok(()) => {
                sync_dir(&dir)?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await?;
        if removed {
            self.release_nonce(&nonce_key(&existing));
        }
        Ok(removed)
    }

    async fn reseal(&self, id: &str, sealed: &SealedPayload) -> Result<Submission> {
        self.ensure_open()?;
        if !is_valid_id(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }
        let _guard = self.locks.lock(id).await;
        let mut current = self
            .read(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        let old_nonce = nonce_key(&current);
        let new_nonce = (
            sealed.key_id.clone().unwrap_or_default(),
            *sealed.nonce.as_bytes(),
        );
        let nonce_changed = new_nonce != old_nonce;
        if nonce_changed {
            self.reserve_nonce(new_nonce.clone())?;
        }

        current.ciphertext = sealed.ciphertext.clone();
        current.nonce = sealed.nonce;
        current.key_id = sealed.key_id.clone();
        current.updated_at = Some(Utc::now());
        if let Err(e) = self.write(&current).await {
            if nonce_changed {
                self.release_nonce(&new_nonce);
            }
            return Err(e);
        }
        if nonce_changed {
            self.release_nonce(&old_nonce);
        }
        Ok(current)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        info!(dir = %self.dir.display(), "File submission store closed");
        Ok(())
    }
}

async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| VaultError::Internal(format!("store task failed: {e}")))?
}

fn nonce_key(submission: &Submission) -> NonceKey {
    (
        submission.key_id.clone().unwrap_or_default(),
        *submission.nonce.as_bytes(),
    )
}

fn record_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.{RECORD_EXT}"))
}

fn read_record(path: &Path) -> Result<Option<Submission>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_all(dir: &Path) -> Result<Vec<Submission>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
            continue;
        }
        match read_record(&path) {
            Ok(Some(submission)) => out.push(submission),
            // Deleted between read_dir and read
            Ok(None) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
        }
    }
    Ok(out)
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| VaultError::Io(e.error))?;
    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
