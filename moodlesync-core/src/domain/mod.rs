// moodlesync-core/src/domain/mod.rs

pub mod error;
pub mod layout;
pub mod plan;
pub mod reconcile;
pub mod record;
pub mod retry;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use error::DomainError;
pub use plan::{SourcePlan, SourceSpec};
pub use reconcile::{Reconciler, UnifiedRow, UnifiedTable};
pub use record::{
    DeliverableStatus, RosterEntry, SourceKind, SourceRecord, SourceValue, SurveyAnswers,
};
pub use retry::{AttemptOutcome, RetryPolicy, SourceState};
