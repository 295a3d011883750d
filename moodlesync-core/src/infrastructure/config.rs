// moodlesync-core/src/infrastructure/config.rs
//
// Typed run configuration. The CLI fills it from flags / environment; nothing here reads the
// environment on its own.

use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::error::DomainError;
use crate::domain::layout::DEFAULT_HISTORY_TAB;
use crate::domain::plan::SourcePlan;
use crate::domain::record::SourceKind;
use crate::domain::retry::RetryPolicy;

pub const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com";
pub const DEFAULT_DRIVE_API: &str = "https://www.googleapis.com";

#[derive(Debug, Clone, Validate)]
pub struct MoodleConfig {
    #[validate(url(message = "MOODLE_BASE_URL must be an absolute URL"))]
    pub base_url: String,

    #[validate(length(min = 1, message = "MOODLE_USERNAME is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "MOODLE_PASSWORD is required"))]
    pub password: String,

    #[validate(range(min = 1, message = "COURSE_ID must be a positive id"))]
    pub course_id: u64,

    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

impl MoodleConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        course_id: u64,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            course_id,
            accept_invalid_certs: false,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_spreadsheet_target"))]
pub struct SheetsConfig {
    pub spreadsheet_name: Option<String>,
    pub spreadsheet_id: Option<String>,

    #[validate(length(min = 1, message = "WORKSHEET_NAME is required"))]
    pub worksheet_name: String,

    #[validate(length(min = 1, message = "HISTORY_WORKSHEET cannot be empty"))]
    pub history_worksheet: String,

    #[validate(custom(function = "validate_credentials_path"))]
    pub credentials_file: PathBuf,

    #[validate(url)]
    pub sheets_api_base: String,

    #[validate(url)]
    pub drive_api_base: String,

    pub timeout: Duration,
}

impl SheetsConfig {
    pub fn new(
        spreadsheet_name: impl Into<String>,
        worksheet_name: impl Into<String>,
        credentials_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            spreadsheet_name: Some(spreadsheet_name.into()),
            spreadsheet_id: None,
            worksheet_name: worksheet_name.into(),
            history_worksheet: DEFAULT_HISTORY_TAB.to_string(),
            credentials_file: credentials_file.into(),
            sheets_api_base: DEFAULT_SHEETS_API.to_string(),
            drive_api_base: DEFAULT_DRIVE_API.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

fn validate_spreadsheet_target(config: &SheetsConfig) -> Result<(), ValidationError> {
    let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    if has(&config.spreadsheet_name) || has(&config.spreadsheet_id) {
        return Ok(());
    }
    let mut err = ValidationError::new("spreadsheet_target");
    err.message = Some("SPREADSHEET_NAME or SPREADSHEET_ID is required".into());
    Err(err)
}

fn validate_credentials_path(path: &PathBuf) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        let mut err = ValidationError::new("credentials_file");
        err.message = Some("GOOGLE_CREDENTIALS_FILE is required".into());
        return Err(err);
    }
    Ok(())
}

/// Source ids and labels exactly as configured, before pairing.
#[derive(Debug, Clone, Default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub ids: Vec<String>,
    pub labels: Vec<String>,
}

impl SourceSettings {
    pub fn plan(&self) -> Result<SourcePlan, DomainError> {
        SourcePlan::pair(self.kind, &self.ids, &self.labels)
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub moodle: MoodleConfig,
    pub sources: SourceSettings,
    pub retry: RetryPolicy,
    pub roster_enrichment: bool,
}

impl SyncConfig {
    /// Validate every setting and pair the sources. No network involved.
    pub fn resolve_plan(&self) -> Result<SourcePlan, DomainError> {
        let plan = self.sources.plan()?;
        self.moodle.validate().map_err(config_error)?;
        Ok(plan)
    }
}

pub fn validate_sheets(config: &SheetsConfig) -> Result<(), DomainError> {
    config.validate().map_err(config_error)
}

fn config_error(errors: ValidationErrors) -> DomainError {
    let mut messages: Vec<String> = Vec::new();
    for (field, errs) in errors.field_errors() {
        for e in errs {
            match &e.message {
                Some(msg) => messages.push(msg.to_string()),
                None => messages.push(format!("invalid value for '{}' ({})", field, e.code)),
            }
        }
    }
    if messages.is_empty() {
        messages.push(errors.to_string());
    }
    messages.sort();
    DomainError::Configuration(messages.join("; "))
}
