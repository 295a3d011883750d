// moodlesync-core/src/ports/sheet.rs

use crate::domain::layout::Grid;
use crate::error::SyncError;
use async_trait::async_trait;

/// Target spreadsheet. Each call is all-or-nothing from the caller's point of view.
#[async_trait]
pub trait SheetWriter: Send + Sync {
    /// Clear the worksheet and write `grid` at the table anchor.
    async fn write_table(&self, grid: &Grid) -> Result<(), SyncError>;

    /// Write the last-run stamp cell.
    async fn stamp_timestamp(&self, value: &str) -> Result<(), SyncError>;

    /// Append one row to the history tab, leaving existing rows alone.
    async fn append_history(&self, row: &[String]) -> Result<(), SyncError>;
}
