// moodlesync-core/src/ports/source.rs

// What the run needs from the LMS, without knowing it is Moodle behind it.

use crate::domain::plan::SourceSpec;
use crate::domain::record::{RosterEntry, SourceKind, SourceRecord};
use crate::error::SyncError;
use async_trait::async_trait;

/// Body of one source as downloaded, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub kind: SourceKind,
    pub body: String,
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Open (or reopen) the authenticated session.
    async fn authenticate(&self) -> Result<(), SyncError>;

    /// Download one source. An expired session surfaces as a transient error.
    async fn fetch_source(&self, source: &SourceSpec) -> Result<RawPayload, SyncError>;

    /// Course participants, used to fill names the sources left blank.
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, SyncError>;
}

pub trait RecordParser: Send + Sync {
    fn parse(&self, source: &SourceSpec, payload: &RawPayload)
    -> Result<Vec<SourceRecord>, SyncError>;
}
