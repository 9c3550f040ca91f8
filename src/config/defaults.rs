// src/config/defaults.rs
use std::path::PathBuf;

use crate::consts::{
    DEFAULT_DECRYPT_CONCURRENCY, DEFAULT_DECRYPT_TIMEOUT_MS, DEFAULT_RATE_LIMIT_MAX,
    DEFAULT_RATE_LIMIT_WINDOW_SECS, DEFAULT_RECENT_WINDOW_DAYS,
};

pub const APP_DIR_NAME: &str = "submission-vault";
pub const DEFAULT_DB_FILE: &str = "submissions.db";

/// `<data_local_dir>/submission-vault/submissions.db`, or the working
/// directory when the platform has no data dir
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DB_FILE)
}

pub fn default_rate_limit_max() -> usize {
    DEFAULT_RATE_LIMIT_MAX
}

pub fn default_rate_limit_window_secs() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}

pub fn default_decrypt_concurrency() -> usize {
    DEFAULT_DECRYPT_CONCURRENCY
}

pub fn default_decrypt_timeout_ms() -> u64 {
    DEFAULT_DECRYPT_TIMEOUT_MS
}

pub fn default_recent_window_days() -> i64 {
    DEFAULT_RECENT_WINDOW_DAYS
}
