// moodlesync/src/commands/check.rs
//
// USE CASE: Validate the configuration offline and show how sources map to columns.

use anyhow::Context;

use moodlesync_core::infrastructure::config::validate_sheets;
use moodlesync_core::infrastructure::sheets::ServiceAccountKey;

use crate::cli::{MoodleArgs, SheetsArgs, SourceArgs};
use crate::commands::{new_table, sheets_config, sync_config};

pub fn execute(moodle: MoodleArgs, sources: SourceArgs, sheets: SheetsArgs) -> anyhow::Result<()> {
    let config = sync_config(&moodle, &sources, Default::default());
    let plan = config
        .resolve_plan()
        .context("Invalid source configuration")?;

    let sheets = sheets_config(&sheets, moodle.timeout_secs);
    validate_sheets(&sheets).context("Invalid spreadsheet configuration")?;
    let key = ServiceAccountKey::from_file(&sheets.credentials_file)
        .context("Unreadable service-account key")?;

    let mut table = new_table();
    table.set_header(vec!["#", "Id", "Label", "Kind"]);
    for spec in plan.sources() {
        table.add_row(vec![
            (spec.position + 1).to_string(),
            spec.id.clone(),
            spec.label.clone(),
            spec.kind.to_string(),
        ]);
    }
    println!("{table}");

    let target = sheets
        .spreadsheet_id
        .clone()
        .or_else(|| sheets.spreadsheet_name.clone())
        .unwrap_or_default();
    println!("📄 Spreadsheet: {} / {}", target, sheets.worksheet_name);
    println!("🔑 Share it with: {}", key.client_email);
    println!("✅ Configuration OK");
    Ok(())
}
