// src/analytics.rs
//! Insight aggregation
//!
//! Pure functions: the same records and the same `now` always produce the
//! same [`Insights`]. Works over stored submissions (index fields only) or
//! over decrypted views when the index was left sparse.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::submission::{day_of, DecryptedView, Submission};

/// Label for records without a category value
pub const UNSPECIFIED: &str = "Unspecified";

const GPA_HIGH: f64 = 3.5;
const GPA_MID: f64 = 3.0;

/// Fields the aggregator reads from a record
pub trait Analyzable {
    fn department(&self) -> Option<&str>;
    fn course(&self) -> Option<&str>;
    fn gpa(&self) -> Option<f64>;
    fn submitted_at(&self) -> DateTime<Utc>;
}

impl Analyzable for Submission {
    fn department(&self) -> Option<&str> {
        self.index.department.as_deref()
    }

    fn course(&self) -> Option<&str> {
        self.index.course.as_deref()
    }

    fn gpa(&self) -> Option<f64> {
        self.index.gpa
    }

    fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

impl Analyzable for DecryptedView {
    fn department(&self) -> Option<&str> {
        self.payload.field_str("department")
    }

    fn course(&self) -> Option<&str> {
        self.payload.field_str("course")
    }

    fn gpa(&self) -> Option<f64> {
        self.payload.gpa()
    }

    fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// GPA buckets: `>= 3.5`, `>= 3.0`, `< 3.0`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpaDistribution {
    pub high: usize,
    pub mid: usize,
    pub low: usize,
    pub unreported: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub total: usize,
    pub by_department: BTreeMap<String, usize>,
    pub by_course: BTreeMap<String, usize>,
    pub gpa_distribution: GpaDistribution,
    pub average_gpa: Option<f64>,
    pub recent_count: usize,
    pub recent_window_days: i64,
    /// Trend: submissions per UTC day
    pub submissions_by_day: BTreeMap<NaiveDate, usize>,
}

pub fn compute_insights<T: Analyzable>(
    records: &[T],
    now: DateTime<Utc>,
    recent_window: Duration,
) -> Insights {
    let cutoff = now - recent_window;
    let mut insights = Insights {
        total: records.len(),
        recent_window_days: recent_window.num_days(),
        ..Insights::default()
    };
    let mut gpa_sum = 0.0;
    let mut gpa_count = 0usize;

    for record in records {
        *insights
            .by_department
            .entry(label(record.department()))
            .or_default() += 1;
        *insights.by_course.entry(label(record.course())).or_default() += 1;

        match record.gpa() {
            Some(g) if g >= GPA_HIGH => insights.gpa_distribution.high += 1,
            Some(g) if g >= GPA_MID => insights.gpa_distribution.mid += 1,
            Some(_) => insights.gpa_distribution.low += 1,
            None => insights.gpa_distribution.unreported += 1,
        }
        if let Some(g) = record.gpa() {
            gpa_sum += g;
            gpa_count += 1;
        }

        let at = record.submitted_at();
        if at > cutoff {
            insights.recent_count += 1;
        }
        *insights.submissions_by_day.entry(day_of(at)).or_default() += 1;
    }

    insights.average_gpa = (gpa_count > 0).then(|| gpa_sum / gpa_count as f64);
    insights
}

fn label(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNSPECIFIED.to_string(),
    }
}
