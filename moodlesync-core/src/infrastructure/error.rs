// moodlesync-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- MOODLE ---
    #[error("Authentication rejected: {0}")]
    #[diagnostic(
        code(moodlesync::infra::auth),
        help("Check MOODLE_USERNAME / MOODLE_PASSWORD or the service account permissions.")
    )]
    Authentication(String),

    #[error("Transient fetch failure: {0}")]
    #[diagnostic(code(moodlesync::infra::fetch))]
    TransientFetch(String),

    #[error("Unexpected page structure: {0}")]
    #[diagnostic(
        code(moodlesync::infra::parse),
        help("The page may have loaded partially. It is retried like a network error.")
    )]
    Parse(String),

    // --- GOOGLE SHEETS ---
    #[error("Spreadsheet write failed: {0}")]
    #[diagnostic(code(moodlesync::infra::write))]
    Write(String),

    #[error("Spreadsheet '{0}' not found")]
    #[diagnostic(
        code(moodlesync::infra::spreadsheet_not_found),
        help("Share the spreadsheet with the service account's client_email, or set SPREADSHEET_ID.")
    )]
    SpreadsheetNotFound(String),

    #[error("Invalid service account credentials: {0}")]
    #[diagnostic(
        code(moodlesync::infra::credentials),
        help("GOOGLE_CREDENTIALS_FILE must point to a service-account JSON key.")
    )]
    Credentials(String),

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(moodlesync::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for InfrastructureError {
    fn from(err: csv::Error) -> Self {
        InfrastructureError::Parse(format!("CSV: {}", err))
    }
}
