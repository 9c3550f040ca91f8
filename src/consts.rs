// src/consts.rs
//! Shared constants: security parameters and defaults

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// 96-bit AES-GCM nonce
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag appended to every ciphertext
pub const TAG_LEN: usize = 16;

/// Inclusive GPA bounds for the plaintext index field
pub const GPA_MIN: f64 = 0.0;
pub const GPA_MAX: f64 = 4.0;

/// Sliding-window admin rate limit
pub const DEFAULT_RATE_LIMIT_MAX: usize = 10;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Rate limiter sweeps idle callers once it tracks this many
pub const RATE_LIMIT_SWEEP_THRESHOLD: usize = 1024;

/// Batch decryption fan-out and per-item deadline
pub const DEFAULT_DECRYPT_CONCURRENCY: usize = 8;
pub const DEFAULT_DECRYPT_TIMEOUT_MS: u64 = 10_000;

/// "Recent" window for insight summaries
pub const DEFAULT_RECENT_WINDOW_DAYS: i64 = 7;

/// Longest accepted plaintext index value
pub const MAX_INDEX_FIELD_CHARS: usize = 256;

/// SQLite busy timeout for concurrent writers
pub const SQLITE_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Context string for local key fingerprints (BLAKE3 derive_key)
pub const KEY_FINGERPRINT_CONTEXT: &str = "submission-vault 2025 local key fingerprint";

/// Encryption-context entry binding the record nonce to a remote ciphertext
pub const REMOTE_NONCE_CONTEXT_KEY: &str = "submission-nonce";

/// Config file looked up when `SV_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "submission-vault.toml";

/// Version tag written into JSON exports
pub const EXPORT_FORMAT_JSON: &str = "submission-vault-index-v1";
