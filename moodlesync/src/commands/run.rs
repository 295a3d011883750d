// moodlesync/src/commands/run.rs
//
// USE CASE: Full run (Moodle -> reconcile -> Google Sheets).

use anyhow::Context;
use tracing::debug;

use moodlesync_core::application::run_sync;
use moodlesync_core::domain::layout::local_run_at;
use moodlesync_core::infrastructure::config::validate_sheets;
use moodlesync_core::infrastructure::moodle::{MoodleFetcher, MoodleRecordParser};
use moodlesync_core::infrastructure::sheets::GoogleSheetWriter;

use crate::cli::{MoodleArgs, RetryArgs, SheetsArgs, SourceArgs};
use crate::commands::{print_source_summary, retry_policy, sheets_config, sync_config};

pub async fn execute(
    moodle: MoodleArgs,
    sources: SourceArgs,
    sheets: SheetsArgs,
    retry: RetryArgs,
) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    // A. Config: everything is checked before the first request
    println!("⚙️  Loading configuration...");
    let config = sync_config(&moodle, &sources, retry_policy(&retry));
    let plan = config.resolve_plan().context("Invalid source configuration")?;
    let sheets = sheets_config(&sheets, moodle.timeout_secs);
    validate_sheets(&sheets).context("Invalid spreadsheet configuration")?;
    println!(
        "   {} {} source(s): {}",
        plan.len(),
        config.sources.kind,
        plan.labels().join(", ")
    );

    // B. Adapters
    let fetcher =
        MoodleFetcher::new(config.moodle.clone()).context("Failed to build the Moodle client")?;
    let writer = GoogleSheetWriter::new(sheets.clone()).with_context(|| {
        format!(
            "Failed to load Google credentials from {}",
            sheets.credentials_file.display()
        )
    })?;

    // C. Run
    let run_at = local_run_at();
    debug!(%run_at, attempts = config.retry.max_attempts, "Run started");
    let report = run_sync(&fetcher, &MoodleRecordParser, &writer, &config, &run_at)
        .await
        .context("Run aborted")?;

    print_source_summary(&report.sources);
    let degraded = report.degraded().count();
    if degraded > 0 {
        println!("⚠️  {} source(s) left blank after every retry", degraded);
    }
    println!(
        "\n✨ SUCCESS! {} row(s) x {} column(s) written to '{}' in {:.2?}",
        report.rows,
        report.columns,
        sheets.worksheet_name,
        start.elapsed()
    );
    Ok(())
}
