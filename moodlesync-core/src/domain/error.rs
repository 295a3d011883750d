// moodlesync-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

/// Configuration problems detected before any network activity.
#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Source ids and labels do not match: {ids} id(s) vs {labels} label(s)")]
    #[diagnostic(
        code(moodlesync::domain::source_mismatch),
        help("SOURCE_IDS and SOURCE_LABELS are comma-separated lists matched by position.")
    )]
    SourceMismatch { ids: usize, labels: usize },

    #[error("No source configured")]
    #[diagnostic(
        code(moodlesync::domain::no_sources),
        help("Set SOURCE_IDS and SOURCE_LABELS (at least one survey or deliverable).")
    )]
    NoSources,

    #[error("Invalid source entry: {0}")]
    #[diagnostic(code(moodlesync::domain::invalid_source))]
    InvalidSource(String),

    #[error("Label '{0}' is used by more than one source")]
    #[diagnostic(
        code(moodlesync::domain::duplicate_label),
        help("Labels become column headers and must be unique.")
    )]
    DuplicateLabel(String),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(moodlesync::domain::configuration))]
    Configuration(String),
}
