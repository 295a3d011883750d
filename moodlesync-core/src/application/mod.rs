// moodlesync-core/src/application/mod.rs

pub mod retry_shell;
pub mod sync;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Le CLI fait `use moodlesync_core::application::{run_sync, collect_table};`
pub use retry_shell::{RetryShell, ShellOutcome};
pub use sync::{Collected, SourceOutcome, SyncReport, collect_table, run_sync};
