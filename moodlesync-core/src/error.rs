// moodlesync-core/src/error.rs

use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

/// How the retry shell treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network flake, timeout, partial page: worth another attempt.
    Transient,
    /// Bad configuration or rejected credentials: retrying cannot help.
    Fatal,
}

#[derive(Error, Debug)]
pub enum SyncError {
    // --- CONFIGURATION (Source plan, required variables) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- ADAPTERS (Moodle, Google Sheets, IO) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    #[error("Every configured source failed ({0} source(s)); the sheet was left untouched")]
    AllSourcesFailed(usize),
}

impl SyncError {
    pub fn class(&self) -> FailureClass {
        match self {
            SyncError::Infrastructure(
                InfrastructureError::TransientFetch(_)
                | InfrastructureError::Parse(_)
                | InfrastructureError::Write(_),
            ) => FailureClass::Transient,
            _ => FailureClass::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Infrastructure(InfrastructureError::Io(err))
    }
}
