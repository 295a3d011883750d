// moodlesync-core/src/domain/record.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;

/// What a source id points to in Moodle.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Feedback activity: one CSV row of answers per respondent.
    #[default]
    Survey,
    /// Assignment: one grading-table row per participant.
    Deliverable,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Survey => write!(f, "survey"),
            SourceKind::Deliverable => write!(f, "deliverable"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "survey" | "feedback" | "encuesta" => Ok(SourceKind::Survey),
            "deliverable" | "assignment" | "assign" | "entregable" => Ok(SourceKind::Deliverable),
            other => Err(DomainError::Configuration(format!(
                "Unknown source kind '{}' (expected survey or deliverable)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SurveyAnswers {
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeliverableStatus {
    pub status: String,
    pub grade: String,
    pub submitted_at: String,
}

/// Payload of one record, tagged by the kind of source that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SourceValue {
    Survey(SurveyAnswers),
    Deliverable(DeliverableStatus),
}

impl SourceValue {
    pub fn survey<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SourceValue::Survey(SurveyAnswers {
            answers: answers.into_iter().map(Into::into).collect(),
        })
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceValue::Survey(_) => SourceKind::Survey,
            SourceValue::Deliverable(_) => SourceKind::Deliverable,
        }
    }
}

/// One raw entry from one source for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    pub email: String,
    pub full_name: String,
    pub timestamp: Option<String>,
    pub value: SourceValue,
}

impl SourceRecord {
    pub fn new(email: impl Into<String>, full_name: impl Into<String>, value: SourceValue) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            timestamp: None,
            value,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        let ts = timestamp.into();
        self.timestamp = if ts.trim().is_empty() { None } else { Some(ts) };
        self
    }
}

/// A course participant as listed by the grader report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RosterEntry {
    pub email: String,
    pub full_name: String,
}

/// Merge key: trimmed, lower-cased email.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
