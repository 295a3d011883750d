// moodlesync-core/src/infrastructure/sheets/mod.rs
//
// Google Sheets adapter over the REST API: Drive lookup by name, values clear/update/append and
// the batchUpdate that creates the history tab.

pub mod auth;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::domain::layout::{Grid, TABLE_ANCHOR, TIMESTAMP_CELL};
use crate::error::SyncError;
use crate::infrastructure::config::SheetsConfig;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::sheet::SheetWriter;

pub use auth::{ServiceAccountKey, TokenProvider};

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const HISTORY_ROWS: u32 = 100;
const HISTORY_COLUMNS: u32 = 2;

#[derive(Debug, Deserialize)]
struct DriveFiles {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// A1 range on a named tab, quoted so spaces and accents survive.
pub fn a1_range(sheet: &str, cells: &str) -> String {
    format!("'{}'!{}", sheet.replace('\'', "''"), cells)
}

fn write_error(context: &str, err: impl std::fmt::Display) -> SyncError {
    SyncError::Infrastructure(InfrastructureError::Write(format!("{}: {}", context, err)))
}

pub struct GoogleSheetWriter {
    client: Client,
    config: SheetsConfig,
    tokens: TokenProvider,
    spreadsheet_id: Mutex<Option<String>>,
}

impl GoogleSheetWriter {
    /// Reads the service-account key named in the config.
    pub fn new(config: SheetsConfig) -> Result<Self, InfrastructureError> {
        let key = ServiceAccountKey::from_file(&config.credentials_file)?;
        Self::with_key(config, key)
    }

    pub fn with_key(config: SheetsConfig, key: ServiceAccountKey) -> Result<Self, InfrastructureError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InfrastructureError::Write(format!("HTTP client: {}", e)))?;
        let tokens = TokenProvider::new(key, client.clone())?;
        let known_id = config
            .spreadsheet_id
            .clone()
            .filter(|id| !id.trim().is_empty());

        Ok(Self {
            client,
            config,
            tokens,
            spreadsheet_id: Mutex::new(known_id),
        })
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.config.sheets_api_base.trim_end_matches('/'),
            spreadsheet_id,
            urlencoding::encode(range),
            suffix
        )
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}{}",
            self.config.sheets_api_base.trim_end_matches('/'),
            spreadsheet_id,
            suffix
        )
    }

    /// Sends with a bearer token and maps the status: 401/403 are fatal, the rest retryable.
    async fn send(&self, context: &str, request: RequestBuilder) -> Result<Value, SyncError> {
        let token = self.tokens.access_token().await?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| write_error(context, e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| write_error(context, e))?;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(InfrastructureError::Authentication(format!(
                    "{}: HTTP {} for {}: {}",
                    context,
                    status,
                    self.tokens.client_email(),
                    body
                ))
                .into())
            }
            s if !s.is_success() => Err(write_error(context, format!("HTTP {}: {}", s, body))),
            _ if body.trim().is_empty() => Ok(Value::Null),
            _ => serde_json::from_str(&body).map_err(|e| write_error(context, e)),
        }
    }

    async fn resolve_spreadsheet(&self) -> Result<String, SyncError> {
        let mut cached = self.spreadsheet_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let name = self
            .config
            .spreadsheet_name
            .clone()
            .unwrap_or_default();
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            name.replace('\\', "\\\\").replace('\'', "\\'"),
            SPREADSHEET_MIME
        );
        let url = format!(
            "{}/drive/v3/files",
            self.config.drive_api_base.trim_end_matches('/')
        );
        let request = self.client.get(url).query(&[
            ("q", query.as_str()),
            ("fields", "files(id,name)"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        let reply = self.send("spreadsheet lookup", request).await?;
        let files: DriveFiles =
            serde_json::from_value(reply).map_err(|e| write_error("spreadsheet lookup", e))?;

        let id = files
            .files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| InfrastructureError::SpreadsheetNotFound(name.clone()))?;
        info!(spreadsheet = %name, id = %id, "📄 Spreadsheet resolved");
        *cached = Some(id.clone());
        Ok(id)
    }

    async fn ensure_tab(&self, spreadsheet_id: &str, title: &str) -> Result<(), SyncError> {
        let request = self
            .client
            .get(self.spreadsheet_url(spreadsheet_id, ""))
            .query(&[("fields", "sheets.properties.title")]);
        let reply = self.send("spreadsheet metadata", request).await?;
        let meta: SpreadsheetMeta =
            serde_json::from_value(reply).map_err(|e| write_error("spreadsheet metadata", e))?;
        if meta.sheets.iter().any(|s| s.properties.title == title) {
            return Ok(());
        }

        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": { "rowCount": HISTORY_ROWS, "columnCount": HISTORY_COLUMNS }
                    }
                }
            }]
        });
        let request = self
            .client
            .post(self.spreadsheet_url(spreadsheet_id, ":batchUpdate"))
            .json(&body);
        self.send("create history tab", request).await?;
        info!(tab = %title, "History tab created");
        Ok(())
    }
}

#[async_trait]
impl SheetWriter for GoogleSheetWriter {
    #[instrument(skip(self, grid), fields(worksheet = %self.config.worksheet_name, rows = grid.len()))]
    async fn write_table(&self, grid: &Grid) -> Result<(), SyncError> {
        let id = self.resolve_spreadsheet().await?;
        let sheet = &self.config.worksheet_name;

        // Whole tab, so a shorter table leaves no stale rows behind.
        let clear_range = format!("'{}'", sheet.replace('\'', "''"));
        let request = self
            .client
            .post(self.values_url(&id, &clear_range, ":clear"))
            .json(&json!({}));
        self.send("clear worksheet", request).await?;

        let range = a1_range(sheet, TABLE_ANCHOR);
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": grid,
        });
        let request = self
            .client
            .put(self.values_url(&id, &range, ""))
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        self.send("write table", request).await?;

        debug!("Table written");
        Ok(())
    }

    async fn stamp_timestamp(&self, value: &str) -> Result<(), SyncError> {
        let id = self.resolve_spreadsheet().await?;
        let range = a1_range(&self.config.worksheet_name, TIMESTAMP_CELL);
        let body = json!({ "range": range, "values": [[value]] });
        let request = self
            .client
            .put(self.values_url(&id, &range, ""))
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        self.send("timestamp cell", request).await?;
        Ok(())
    }

    #[instrument(skip(self, row), fields(tab = %self.config.history_worksheet))]
    async fn append_history(&self, row: &[String]) -> Result<(), SyncError> {
        let id = self.resolve_spreadsheet().await?;
        let tab = &self.config.history_worksheet;
        self.ensure_tab(&id, tab).await?;

        let range = a1_range(tab, "A:B");
        let body = json!({ "values": [row] });
        let request = self
            .client
            .post(self.values_url(&id, &range, ":append"))
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&body);
        self.send("append history", request).await?;
        Ok(())
    }
}
