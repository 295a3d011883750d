// moodlesync-core/src/infrastructure/moodle/parser.rs
//
// Turns downloaded Moodle payloads into records: the feedback CSV export for surveys, the
// assignment grading table for deliverables.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::domain::plan::SourceSpec;
use crate::domain::record::{DeliverableStatus, SourceKind, SourceRecord, SourceValue};
use crate::error::SyncError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::moodle::html::cell_text;
use crate::ports::source::{RawPayload, RecordParser};

#[allow(clippy::unwrap_used)]
static TABLE_ROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap());

#[allow(clippy::unwrap_used)]
static TABLE_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<td\b[^>]*\bclass="([^"]*)"[^>]*>(.*?)</td>"#).unwrap());

const EMPTY_TABLE_MARKERS: [&str; 3] = ["emptymsg", "Nothing to display", "Nada que mostrar"];

#[derive(Debug, Clone, Copy, Default)]
pub struct MoodleRecordParser;

impl RecordParser for MoodleRecordParser {
    fn parse(
        &self,
        source: &SourceSpec,
        payload: &RawPayload,
    ) -> Result<Vec<SourceRecord>, SyncError> {
        let records = match payload.kind {
            SourceKind::Survey => parse_survey_csv(&payload.body)?,
            SourceKind::Deliverable => parse_grading_table(&payload.body)?,
        };
        debug!(source = %source.label, records = records.len(), "Payload parsed");
        Ok(records)
    }
}

fn clean_field(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

fn is_email_header(h: &str) -> bool {
    let h = h.to_lowercase();
    h == "dirección email" || h == "email address" || h.contains("email") || h.contains("correo")
}

fn is_date_header(h: &str) -> bool {
    let h = h.to_lowercase();
    h == "fecha" || h == "date"
}

/// Feedback "show entries" CSV export.
///
/// The email column is mandatory; the date column is optional; the first remaining column is
/// the respondent's name and everything else is an answer, in export order.
pub fn parse_survey_csv(body: &str) -> Result<Vec<SourceRecord>, InfrastructureError> {
    let body = body.trim_start_matches('\u{feff}');
    if body.trim().is_empty() {
        return Err(InfrastructureError::Parse("survey export is empty".into()));
    }
    if body.trim_start().starts_with('<') {
        return Err(InfrastructureError::Parse(
            "received an HTML page instead of the CSV export".into(),
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(clean_field).collect();

    let email_idx = headers
        .iter()
        .position(|h| is_email_header(h))
        .ok_or_else(|| {
            InfrastructureError::Parse(format!(
                "no email column in survey export (headers: {})",
                headers.join(", ")
            ))
        })?;
    let date_idx = headers.iter().position(|h| is_date_header(h));
    let name_idx = (0..headers.len()).find(|i| *i != email_idx && Some(*i) != date_idx);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let fields: Vec<String> = row.iter().map(clean_field).collect();
        if fields.iter().all(String::is_empty) {
            continue;
        }

        let field = |idx: Option<usize>| idx.and_then(|i| fields.get(i)).cloned().unwrap_or_default();
        let answers: Vec<String> = fields
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != email_idx && Some(*i) != date_idx && Some(*i) != name_idx)
            .map(|(_, v)| v.clone())
            .collect();

        records.push(
            SourceRecord::new(field(Some(email_idx)), field(name_idx), SourceValue::survey(answers))
                .with_timestamp(field(date_idx)),
        );
    }

    Ok(records)
}

/// Assignment grading table (`view.php?action=grading`).
///
/// Cells are recognised by their column class, so column order and optional columns
/// (pictures, checkboxes, feedback) do not matter.
pub fn parse_grading_table(body: &str) -> Result<Vec<SourceRecord>, InfrastructureError> {
    let has_table = body.contains("id=\"submissions\"") || body.contains("generaltable");
    if !has_table {
        if EMPTY_TABLE_MARKERS.iter().any(|m| body.contains(m)) {
            return Ok(Vec::new());
        }
        return Err(InfrastructureError::Parse(
            "grading page has no submissions table".into(),
        ));
    }

    let mut records = Vec::new();
    for row in TABLE_ROW.captures_iter(body) {
        let mut name = String::new();
        let mut email = String::new();
        let mut status = DeliverableStatus::default();

        for cell in TABLE_CELL.captures_iter(&row[1]) {
            let text = cell_text(&cell[2]);
            for class in cell[1].split_whitespace() {
                match class {
                    "fullname" => name = text.clone(),
                    "email" => email = text.clone(),
                    "status" => status.status = text.clone(),
                    "grade" | "finalgrade" if status.grade.is_empty() => status.grade = text.clone(),
                    "timesubmitted" => status.submitted_at = text.clone(),
                    _ => continue,
                }
                break;
            }
        }

        if email.is_empty() {
            // Header, empty placeholder or a row without the email column.
            continue;
        }
        let submitted_at = status.submitted_at.clone();
        records.push(
            SourceRecord::new(email, name, SourceValue::Deliverable(status)).with_timestamp(submitted_at),
        );
    }

    Ok(records)
}
