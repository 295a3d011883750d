// moodlesync/src/commands/preview.rs
//
// USE CASE: Fetch and reconcile, print the grid. The spreadsheet is never touched.

use anyhow::Context;

use moodlesync_core::application::collect_table;
use moodlesync_core::domain::layout::render_grid;
use moodlesync_core::infrastructure::moodle::{MoodleFetcher, MoodleRecordParser};

use crate::cli::{MoodleArgs, RetryArgs, SourceArgs};
use crate::commands::{new_table, print_source_summary, retry_policy, sync_config};

pub async fn execute(
    moodle: MoodleArgs,
    sources: SourceArgs,
    retry: RetryArgs,
) -> anyhow::Result<()> {
    let config = sync_config(&moodle, &sources, retry_policy(&retry));
    config
        .resolve_plan()
        .context("Invalid source configuration")?;

    let fetcher =
        MoodleFetcher::new(config.moodle.clone()).context("Failed to build the Moodle client")?;
    let collected = collect_table(&fetcher, &MoodleRecordParser, &config)
        .await
        .context("Preview aborted")?;

    let mut grid = render_grid(&collected.table).into_iter();
    let mut table = new_table();
    if let Some(header) = grid.next() {
        table.set_header(header);
    }
    for line in grid {
        table.add_row(line);
    }
    println!("{table}");

    print_source_summary(&collected.sources);
    println!(
        "👀 {} row(s), {} name(s) filled from the roster. Nothing written.",
        collected.table.len(),
        collected.names_filled
    );
    Ok(())
}
