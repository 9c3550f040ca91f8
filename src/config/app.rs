// src/config/app.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use super::defaults::*;
use crate::consts::DEFAULT_CONFIG_FILE;
use crate::enums::{KeyProviderKind, StoreBackend};
use crate::error::{Result, VaultError};

pub const ENV_CONFIG: &str = "SV_CONFIG";
pub const ENV_STORE_PATH: &str = "SV_STORE_PATH";
pub const ENV_ADMIN_SECRET: &str = "SV_ADMIN_SECRET";
pub const ENV_LOCAL_KEY_HEX: &str = "SV_LOCAL_KEY_HEX";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub keys: KeysConfig,
    pub admin: AdminConfig,
    pub decrypt: DecryptConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file for `sqlite`, directory for `json-files`
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub provider: KeyProviderKind,
    /// Active 256-bit key for the local provider, hex encoded
    pub local_key_hex: Option<String>,
    /// Retired local keys kept for decrypting older submissions
    pub previous_key_hex: Vec<String>,
    /// Key alias or id in the custody service
    pub remote_key_name: Option<String>,
    pub remote_region: Option<String>,
}

impl fmt::Debug for KeysConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeysConfig")
            .field("provider", &self.provider)
            .field("local_key_hex", &self.local_key_hex.as_ref().map(|_| "<redacted>"))
            .field("previous_keys", &self.previous_key_hex.len())
            .field("remote_key_name", &self.remote_key_name)
            .field("remote_region", &self.remote_region)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub secret: Option<String>,
    pub rate_limit_max: usize,
    pub rate_limit_window_secs: u64,
}

impl AdminConfig {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            secret: None,
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
        }
    }
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("rate_limit_max", &self.rate_limit_max)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecryptConfig {
    /// Batch items decrypted at once
    pub concurrency: usize,
    /// Deadline for a single item, in milliseconds
    pub timeout_ms: u64,
}

impl DecryptConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            concurrency: default_decrypt_concurrency(),
            timeout_ms: default_decrypt_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub recent_window_days: i64,
}

impl AnalyticsConfig {
    pub fn recent_window(&self) -> chrono::Duration {
        // Clamped to a century; beyond that every record is "recent" anyway
        chrono::Duration::days(self.recent_window_days.clamp(0, 36_500))
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            recent_window_days: default_recent_window_days(),
        }
    }
}

impl Config {
    /// Load from `SV_CONFIG` (or `submission-vault.toml`), then apply env overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    /// A missing file yields defaults; an unreadable or invalid one is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut conf = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let conf = Self::from_toml_str(&content)?;
            info!(path = %path.display(), "Loaded configuration");
            conf
        } else {
            warn!(path = %path.display(), "Config file not found, using built-in defaults");
            Self::default()
        };
        conf.apply_env_overrides();
        conf.validate()?;
        Ok(conf)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let conf: Self =
            toml::from_str(content).map_err(|e| VaultError::Config(format!("invalid TOML: {e}")))?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = env_non_empty(ENV_STORE_PATH) {
            self.store.path = PathBuf::from(path);
        }
        if let Some(secret) = env_non_empty(ENV_ADMIN_SECRET) {
            self.admin.secret = Some(secret);
        }
        if let Some(key) = env_non_empty(ENV_LOCAL_KEY_HEX) {
            self.keys.local_key_hex = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.decrypt.concurrency == 0 {
            return Err(VaultError::Config("decrypt.concurrency must be at least 1".into()));
        }
        if self.decrypt.timeout_ms == 0 {
            return Err(VaultError::Config("decrypt.timeout_ms must be positive".into()));
        }
        if self.admin.rate_limit_max == 0 || self.admin.rate_limit_window_secs == 0 {
            return Err(VaultError::Config(
                "admin.rate_limit_max and admin.rate_limit_window_secs must be positive".into(),
            ));
        }
        if self.analytics.recent_window_days < 0 {
            return Err(VaultError::Config(
                "analytics.recent_window_days must not be negative".into(),
            ));
        }
        Ok(())
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
