// src/export/mod.rs
//! Export utilities for submission-vault
//!
//! Renders the index fields of a submission collection. Ciphertext, nonces
//! and decrypted content are never part of an export.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::info;

use crate::enums::ExportFormat;
use crate::error::{Result, VaultError};
use crate::submission::Submission;

pub use csv::{render_csv, CSV_HEADER};
pub use json::render_json;

pub mod csv;
pub mod json;

/// Rendered export plus the metadata a transport needs to serve it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub format: ExportFormat,
    pub content_type: &'static str,
    pub file_name: String,
    pub body: String,
    pub rows: usize,
}

pub fn render(
    format: ExportFormat,
    submissions: &[Submission],
    exported_at: DateTime<Utc>,
) -> Result<ExportDocument> {
    let stamp = exported_at.format("%Y%m%dT%H%M%SZ");
    let (body, content_type, file_name) = match format {
        ExportFormat::Csv => (
            render_csv(submissions),
            "text/csv; charset=utf-8",
            format!("submissions-{stamp}.csv"),
        ),
        ExportFormat::JsonV1 => (
            render_json(submissions, exported_at)?,
            "application/json",
            format!("submissions-{stamp}.json"),
        ),
    };
    Ok(ExportDocument {
        format,
        content_type,
        file_name,
        body,
        rows: submissions.len(),
    })
}

/// Write an export next to `path` and atomically move it into place
pub fn write_to_path(path: &Path, document: &ExportDocument) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(document.body.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| VaultError::Io(e.error))?;
    info!(
        rows = document.rows,
        path = %path.display(),
        "Exported submission index"
    );
    Ok(())
}
