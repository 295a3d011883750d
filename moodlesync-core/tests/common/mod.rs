//! Shared helpers for the adapter tests: Moodle login pages, a throwaway service-account key and
//! the mock Google endpoints every write needs.

#![allow(dead_code)]

use anyhow::Result;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use moodlesync_core::infrastructure::config::SheetsConfig;

pub const LOGIN_PAGE: &str = r#"<html><body>
<form action="/login/index.php" method="post" id="login">
  <input type="hidden" name="logintoken" value="T0k3n42">
  <input type="text" name="username"><input type="password" name="password">
  <button type="submit" id="loginbtn">Acceder</button>
</form></body></html>"#;

pub const DASHBOARD: &str = r#"<html><head><script>M.cfg = {"wwwroot":"http:\/\/campus","sesskey":"Sk3yAbc123","sessiontimeout":"7200"};</script></head>
<body><h1>Área personal</h1></body></html>"#;

pub const TEST_KEY_PEM: &str = include_str!("../fixtures/test_service_account.pem");
pub const CLIENT_EMAIL: &str = "sync-bot@demo.iam.gserviceaccount.com";
pub const ACCESS_TOKEN: &str = "ya29.test-token";
pub const SPREADSHEET_ID: &str = "sheet123";

/// Writes a service-account key whose token_uri points at the mock server.
pub fn write_key(server: &MockServer) -> Result<NamedTempFile> {
    let key = json!({
        "type": "service_account",
        "project_id": "demo",
        "client_email": CLIENT_EMAIL,
        "private_key": TEST_KEY_PEM,
        "token_uri": format!("{}/token", server.uri()),
    });
    let mut file = NamedTempFile::new()?;
    file.write_all(key.to_string().as_bytes())?;
    Ok(file)
}

pub fn sheets_config(server: &MockServer, key: &NamedTempFile) -> SheetsConfig {
    let mut config = SheetsConfig::new("Seguimiento", "Datos", key.path());
    config.sheets_api_base = server.uri();
    config.drive_api_base = server.uri();
    config
}

pub async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_drive_lookup(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str()))
        .and(query_param(
            "q",
            "name = 'Seguimiento' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": SPREADSHEET_ID, "name": "Seguimiento" }]
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Metadata listing the given tabs.
pub async fn mount_tabs(server: &MockServer, titles: &[&str]) {
    let sheets: Vec<_> = titles
        .iter()
        .map(|t| json!({ "properties": { "title": t } }))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{}", SPREADSHEET_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sheets": sheets })))
        .mount(server)
        .await;
}

/// Login form, credential POST and dashboard carrying the sesskey.
pub async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/login/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login/index.php"))
        .and(body_string_contains("logintoken=T0k3n42"))
        .and(body_string_contains("username=tutor"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DASHBOARD))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/my/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DASHBOARD))
        .mount(server)
        .await;
}
