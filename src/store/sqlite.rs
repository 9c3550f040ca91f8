// src/store/sqlite.rs
//! SQLite-backed submission store
//!
//! Every operation runs on the blocking pool with a connection checked out of
//! a small idle pool and returned when the guard drops. WAL journaling plus
//! `synchronous = FULL` means a committed write survives power loss.
//! Read-modify-write paths take an IMMEDIATE transaction so two writers of the
//! same row are serialized by SQLite itself.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::consts::SQLITE_BUSY_TIMEOUT_MS;
use crate::crypto::Nonce96;
use crate::enums::StoreBackend;
use crate::error::{Result, VaultError};
use crate::keys::SealedPayload;
use crate::submission::{IndexFields, IndexFieldsPatch, NewSubmission, Submission, SubmissionFilter};

use super::{duplicate_nonce, is_valid_id, new_submission_id, validate_new, SubmissionStore};

const MAX_IDLE_CONNECTIONS: usize = 4;

const SELECT_COLUMNS: &str = "id, ciphertext, nonce, key_id, submitted_at_ns, updated_at_ns, \
     course, department, gpa, name, email, phone, document_name";

pub struct SqliteStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = Arc::new(ConnectionPool::new(path.to_path_buf()));
        let store = Self { pool };
        store.with_conn(|conn| init_schema(conn)).await?;
        info!(path = %path.display(), "SQLite submission store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.pool.path
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.acquire()?;
            op(&mut conn)
        })
        .await
        .map_err(|e| VaultError::Internal(format!("store task failed: {e}")))?
    }
}

#[async_trait]
impl SubmissionStore for SqliteStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }

    async fn create(&self, new: NewSubmission) -> Result<Submission> {
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
        let row = submission.clone();
        self.with_conn(move |conn| {
            let index = &row.index;
            conn.execute(
                "INSERT INTO submissions (id, ciphertext, nonce, key_id, submitted_at_ns, \
                 updated_at_ns, course, department, gpa, name, email, phone, document_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    row.id,
                    row.ciphertext,
                    row.nonce.as_bytes().as_slice(),
                    row.key_id,
                    to_nanos(row.submitted_at)?,
                    index.course,
                    index.department,
                    index.gpa,
                    index.name,
                    index.email,
                    index.phone,
                    index.document_name,
                ],
            )
            .map_err(map_nonce_conflict)?;
            Ok(())
        })
        .await?;
        debug!(
            id = %submission.id,
            ciphertext_len = submission.ciphertext.len(),
            "Submission stored"
        );
        Ok(submission)
    }

    async fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let (sql, values) = list_query(&filter)?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_submission)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(VaultError::from)
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Submission> {
        if !is_valid_id(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }
        let id = id.to_string();
        self.with_conn(move |conn| {
            fetch(conn, &id)?.ok_or(VaultError::NotFound(id))
        })
        .await
    }

    async fn update(&self, id: &str, patch: &IndexFieldsPatch) -> Result<Submission> {
        if !is_valid_id(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }
        let id = id.to_string();
        let patch = patch.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut current = fetch(&tx, &id)?.ok_or_else(|| VaultError::NotFound(id.clone()))?;
            if patch.is_empty() {
                return Ok(current);
            }
            let index = patch.apply(&current.index);
            index.validate()?;
            let now = Utc::now();
            tx.execute(
                "UPDATE submissions SET course = ?2, department = ?3, gpa = ?4, name = ?5, \
                 email = ?6, phone = ?7, document_name = ?8, updated_at_ns = ?9
                 WHERE id = ?1",
                params![
                    id,
                    index.course,
                    index.department,
                    index.gpa,
                    index.name,
                    index.email,
                    index.phone,
                    index.document_name,
                    to_nanos(now)?,
                ],
            )?;
            tx.commit()?;
            current.index = index;
            current.updated_at = Some(now);
            Ok(current)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        if !is_valid_id(id) {
            return Ok(false);
        }
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM submissions WHERE id = ?1", [&id])?;
            Ok(changed > 0)
        })
        .await
    }

    async fn reseal(&self, id: &str, sealed: &SealedPayload) -> Result<Submission> {
        if !is_valid_id(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }
        let id = id.to_string();
        let sealed = sealed.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut current = fetch(&tx, &id)?.ok_or_else(|| VaultError::NotFound(id.clone()))?;
            let now = Utc::now();
            tx.execute(
                "UPDATE submissions SET ciphertext = ?2, nonce = ?3, key_id = ?4, updated_at_ns = ?5
                 WHERE id = ?1",
                params![
                    id,
                    sealed.ciphertext,
                    sealed.nonce.as_bytes().as_slice(),
                    sealed.key_id,
                    to_nanos(now)?,
                ],
            )
            .map_err(map_nonce_conflict)?;
            tx.commit()?;
            current.ciphertext = sealed.ciphertext;
            current.nonce = sealed.nonce;
            current.key_id = sealed.key_id;
            current.updated_at = Some(now);
            Ok(current)
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        info!(path = %self.pool.path.display(), "SQLite submission store closed");
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id TEXT PRIMARY KEY,
            ciphertext BLOB NOT NULL,
            nonce BLOB NOT NULL,
            key_id TEXT,
            submitted_at_ns INTEGER NOT NULL,
            updated_at_ns INTEGER,
            course TEXT,
            department TEXT,
            gpa REAL,
            name TEXT,
            email TEXT,
            phone TEXT,
            document_name TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_submissions_order ON submissions(submitted_at_ns DESC, id);
        CREATE INDEX IF NOT EXISTS idx_submissions_department ON submissions(department);
        CREATE INDEX IF NOT EXISTS idx_submissions_course ON submissions(course);

        -- A nonce may appear at most once per key
        CREATE UNIQUE INDEX IF NOT EXISTS idx_submissions_key_nonce
            ON submissions(IFNULL(key_id, ''), nonce);
        "#,
    )?;
    Ok(())
}

fn fetch(conn: &Connection, id: &str) -> Result<Option<Submission>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM submissions WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_submission).optional()?)
}

fn list_query(filter: &SubmissionFilter) -> Result<(String, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(dept) = &filter.department {
        values.push(Value::Text(dept.clone()));
        clauses.push(format!("department = ?{}", values.len()));
    }
    if let Some(course) = &filter.course {
        values.push(Value::Text(course.clone()));
        clauses.push(format!("course = ?{}", values.len()));
    }
    if let Some(min) = filter.min_gpa {
        values.push(Value::Real(min));
        clauses.push(format!("gpa >= ?{}", values.len()));
    }
    if let Some(max) = filter.max_gpa {
        values.push(Value::Real(max));
        clauses.push(format!("gpa <= ?{}", values.len()));
    }
    if let Some(after) = filter.submitted_after {
        values.push(Value::Integer(to_nanos(after)?));
        clauses.push(format!("submitted_at_ns > ?{}", values.len()));
    }

    let mut sql = format!("SELECT {SELECT_COLUMNS} FROM submissions");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY submitted_at_ns DESC, id ASC");
    if let Some(limit) = filter.limit {
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
    }
    Ok((sql, values))
}

fn row_to_submission(row: &Row<'_>) -> rusqlite::Result<Submission> {
    let nonce_bytes: Vec<u8> = row.get("nonce")?;
    let nonce = Nonce96::try_from(nonce_bytes.as_slice())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Blob, Box::new(e)))?;
    let updated_at: Option<i64> = row.get("updated_at_ns")?;
    Ok(Submission {
        id: row.get("id")?,
        ciphertext: row.get("ciphertext")?,
        nonce,
        key_id: row.get("key_id")?,
        submitted_at: DateTime::from_timestamp_nanos(row.get("submitted_at_ns")?),
        updated_at: updated_at.map(DateTime::from_timestamp_nanos),
        index: IndexFields {
            course: row.get("course")?,
            department: row.get("department")?,
            gpa: row.get("gpa")?,
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            document_name: row.get("document_name")?,
        },
    })
}

fn to_nanos(ts: DateTime<Utc>) -> Result<i64> {
    ts.timestamp_nanos_opt()
        .ok_or_else(|| VaultError::Internal(format!("timestamp {ts} out of range")))
}

fn map_nonce_conflict(err: rusqlite::Error) -> VaultError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            duplicate_nonce()
        }
        _ => VaultError::Sql(err),
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_millis(SQLITE_BUSY_TIMEOUT_MS))?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(journal_mode = %mode, "SQLite connection opened");
    conn.pragma_update(None, "synchronous", "FULL")?;
    Ok(conn)
}

/// Idle connections reused across calls; a checkout is returned on drop
struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    closed: AtomicBool,
}

impl ConnectionPool {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VaultError::ServiceUnavailable("submission store"));
        }
        let idle = self.idle.lock().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => open_connection(&self.path)?,
        };
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.idle.lock().clear();
    }
}

struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `None` after drop has taken it
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.pool.closed.load(Ordering::Acquire) {
            return;
        }
        let mut idle = self.pool.idle.lock();
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
    }
}
