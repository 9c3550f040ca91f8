// src/export/csv.rs
//! RFC 4180 CSV of index fields
//!
//! Text cells that a spreadsheet would evaluate as a formula (leading `=`,
//! `+`, `-`, `@`, tab or CR) are prefixed with `'`.

use crate::submission::Submission;

pub const CSV_HEADER: [&str; 9] = [
    "id",
    "submittedAt",
    "course",
    "department",
    "gpa",
    "name",
    "email",
    "phone",
    "documentName",
];

const LINE_END: &str = "\r\n";

pub fn render_csv(submissions: &[Submission]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push_str(LINE_END);
    for s in submissions {
        let index = &s.index;
        let row = [
            text_cell(&s.id),
            text_cell(&s.submitted_at.to_rfc3339()),
            opt_cell(index.course.as_deref()),
            opt_cell(index.department.as_deref()),
            index.gpa.map(|g| g.to_string()).unwrap_or_default(),
            opt_cell(index.name.as_deref()),
            opt_cell(index.email.as_deref()),
            opt_cell(index.phone.as_deref()),
            opt_cell(index.document_name.as_deref()),
        ];
        out.push_str(&row.join(","));
        out.push_str(LINE_END);
    }
    out
}

fn opt_cell(value: Option<&str>) -> String {
    value.map(text_cell).unwrap_or_default()
}

fn text_cell(value: &str) -> String {
    let neutralised = match value.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{value}"),
        _ => value.to_string(),
    };
    if neutralised.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", neutralised.replace('"', "\"\""))
    } else {
        neutralised
    }
}
