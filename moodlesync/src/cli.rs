// moodlesync/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).
// Every option can also come from the environment (or a `.env` file).

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use moodlesync_core::domain::layout::DEFAULT_HISTORY_TAB;
use moodlesync_core::domain::record::SourceKind;
use moodlesync_core::infrastructure::config::{DEFAULT_DRIVE_API, DEFAULT_SHEETS_API};

#[derive(Parser)]
#[command(name = "moodlesync")]
#[command(about = "Moodle surveys & assignments to Google Sheets, one row per student", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Debug logs (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🚀 Fetches every source and rewrites the worksheet
    Run {
        #[command(flatten)]
        moodle: MoodleArgs,
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        sheets: SheetsArgs,
        #[command(flatten)]
        retry: RetryArgs,
    },

    /// 👀 Fetches and reconciles, then prints the table (no spreadsheet access)
    Preview {
        #[command(flatten)]
        moodle: MoodleArgs,
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        retry: RetryArgs,
    },

    /// 🩺 Validates the configuration and prints the source plan (no network)
    Check {
        #[command(flatten)]
        moodle: MoodleArgs,
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        sheets: SheetsArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct MoodleArgs {
    /// Moodle root URL (ex: "https://campus.example.org")
    #[arg(long = "moodle-url", env = "MOODLE_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long = "moodle-user", env = "MOODLE_USERNAME")]
    pub username: Option<String>,

    #[arg(long = "moodle-password", env = "MOODLE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Course whose participants fill missing names
    #[arg(long, env = "COURSE_ID")]
    pub course_id: Option<u64>,

    /// Skip TLS certificate verification (self-signed campus servers)
    #[arg(long, env = "MOODLE_ACCEPT_INVALID_CERTS")]
    pub accept_invalid_certs: bool,

    /// Per-request timeout, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// survey | deliverable
    #[arg(long, env = "SOURCE_KIND", default_value = "survey")]
    pub source_kind: SourceKind,

    /// Activity ids, comma-separated
    #[arg(long, env = "SOURCE_IDS", value_delimiter = ',')]
    pub source_ids: Vec<String>,

    /// Column labels, comma-separated, one per id
    #[arg(long, env = "SOURCE_LABELS", value_delimiter = ',')]
    pub source_labels: Vec<String>,

    /// Fill blank names from the course participants
    #[arg(long, env = "ROSTER_ENRICHMENT", default_value_t = true, action = ArgAction::Set)]
    pub roster_enrichment: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SheetsArgs {
    /// Spreadsheet title, looked up through Drive
    #[arg(long, env = "SPREADSHEET_NAME")]
    pub spreadsheet_name: Option<String>,

    /// Spreadsheet id (skips the Drive lookup)
    #[arg(long, env = "SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    #[arg(long, env = "WORKSHEET_NAME")]
    pub worksheet_name: Option<String>,

    #[arg(long, env = "HISTORY_WORKSHEET", default_value = DEFAULT_HISTORY_TAB)]
    pub history_worksheet: String,

    /// Service-account JSON key
    #[arg(long = "credentials", env = "GOOGLE_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    #[arg(long, env = "SHEETS_API_BASE", default_value = DEFAULT_SHEETS_API, hide = true)]
    pub sheets_api_base: String,

    #[arg(long, env = "DRIVE_API_BASE", default_value = DEFAULT_DRIVE_API, hide = true)]
    pub drive_api_base: String,
}

#[derive(Args, Debug, Clone)]
pub struct RetryArgs {
    /// Attempts per source and per spreadsheet call
    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub retry_max_attempts: u32,

    /// Base delay between attempts, in milliseconds (grows linearly, capped at 10 s)
    #[arg(long, env = "RETRY_DELAY_MS", default_value_t = 2000)]
    pub retry_delay_ms: u64,
}
