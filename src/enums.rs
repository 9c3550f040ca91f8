// src/enums.rs
//! Public enum types used throughout the crate
//!
//! Central location for all #[derive(...)] enums that represent
//! operator-visible choices: key provider, store backend, export format.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which key provider variant backs encryption
///
/// Chosen once from configuration when the app is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum KeyProviderKind {
    /// Static key held in process memory (demo only)
    Local,
    /// Key held by an external key-custody service
    Remote,
    /// Nothing configured; every key operation reports `ServiceUnavailable`
    #[default]
    Unconfigured,
}

impl fmt::Display for KeyProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyProviderKind::Local => "local",
            KeyProviderKind::Remote => "remote",
            KeyProviderKind::Unconfigured => "unconfigured",
        })
    }
}

/// Persistence engine behind the submission store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum StoreBackend {
    #[default]
    Sqlite,
    JsonFiles,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreBackend::Sqlite => "sqlite",
            StoreBackend::JsonFiles => "json-files",
        })
    }
}

/// Index-field export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ExportFormat {
    #[default]
    Csv,
    JsonV1,
}
