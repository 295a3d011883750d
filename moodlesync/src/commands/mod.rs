// moodlesync/src/commands/mod.rs
//
// CLI arguments -> typed core configuration, plus the tables the commands print.

pub mod check;
pub mod preview;
pub mod run;

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use std::time::Duration;

use moodlesync_core::application::SourceOutcome;
use moodlesync_core::domain::retry::RetryPolicy;
use moodlesync_core::infrastructure::config::{
    MoodleConfig, SheetsConfig, SourceSettings, SyncConfig,
};

use crate::cli::{MoodleArgs, RetryArgs, SheetsArgs, SourceArgs};

pub fn moodle_config(args: &MoodleArgs) -> MoodleConfig {
    let mut config = MoodleConfig::new(
        args.base_url.clone().unwrap_or_default(),
        args.username.clone().unwrap_or_default(),
        args.password.clone().unwrap_or_default(),
        args.course_id.unwrap_or_default(),
    );
    config.accept_invalid_certs = args.accept_invalid_certs;
    config.timeout = Duration::from_secs(args.timeout_secs);
    config
}

pub fn retry_policy(args: &RetryArgs) -> RetryPolicy {
    RetryPolicy::new(args.retry_max_attempts)
        .with_base_delay(Duration::from_millis(args.retry_delay_ms))
}

pub fn sync_config(moodle: &MoodleArgs, sources: &SourceArgs, retry: RetryPolicy) -> SyncConfig {
    SyncConfig {
        moodle: moodle_config(moodle),
        sources: SourceSettings {
            kind: sources.source_kind,
            ids: sources.source_ids.clone(),
            labels: sources.source_labels.clone(),
        },
        retry,
        roster_enrichment: sources.roster_enrichment,
    }
}

pub fn sheets_config(args: &SheetsArgs, timeout_secs: u64) -> SheetsConfig {
    SheetsConfig {
        spreadsheet_name: args.spreadsheet_name.clone(),
        spreadsheet_id: args.spreadsheet_id.clone(),
        worksheet_name: args.worksheet_name.clone().unwrap_or_default(),
        history_worksheet: args.history_worksheet.clone(),
        credentials_file: args.credentials_file.clone().unwrap_or_default(),
        sheets_api_base: args.sheets_api_base.clone(),
        drive_api_base: args.drive_api_base.clone(),
        timeout: Duration::from_secs(timeout_secs),
    }
}

pub fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// One line per source: state, attempts, records, last error.
pub fn print_source_summary(sources: &[SourceOutcome]) {
    let mut table = new_table();
    table.set_header(vec!["Source", "Id", "State", "Attempts", "Records", "Error"]);
    for s in sources {
        table.add_row(vec![
            s.label.clone(),
            s.id.clone(),
            s.state.to_string(),
            s.attempts.to_string(),
            s.records.to_string(),
            s.last_error.clone().unwrap_or_default(),
        ]);
    }
    println!("{table}");
}
