// src/export/json.rs
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::consts::EXPORT_FORMAT_JSON;
use crate::error::Result;
use crate::submission::Submission;

/// Versioned JSON document of index fields.
///
/// Same exposure as the CSV export: what the index already keeps in the clear.
pub fn render_json(submissions: &[Submission], exported_at: DateTime<Utc>) -> Result<String> {
    let rows: Vec<_> = submissions
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "submittedAt": s.submitted_at,
                "updatedAt": s.updated_at,
                "keyId": s.key_id,
                "indexFields": s.index,
            })
        })
        .collect();

    let export = json!({
        "export_format": EXPORT_FORMAT_JSON,
        "exported_at": exported_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "exporter_version": env!("CARGO_PKG_VERSION"),
        "total_submissions": rows.len(),
        "submissions": rows,
    });

    Ok(serde_json::to_string_pretty(&export)?)
}
