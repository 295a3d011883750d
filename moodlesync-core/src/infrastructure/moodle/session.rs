// moodlesync-core/src/infrastructure/moodle/session.rs

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static LOGIN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="logintoken"\s+value="(\w+)""#).unwrap());

#[allow(clippy::unwrap_used)]
static SESSKEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sesskey["']*\s*:?\s*["']([a-zA-Z0-9]+)"#).unwrap());

#[allow(clippy::unwrap_used)]
static LOGIN_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(?:div|a|span)[^>]*(?:loginerrormessage|alert-danger)[^>]*>(.*?)</(?:div|a|span)>"#)
        .unwrap()
});

/// Authenticated Moodle session. Cookies live in the HTTP client; this holds the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodleSession {
    pub sesskey: String,
}

pub fn extract_login_token(html: &str) -> Option<String> {
    LOGIN_TOKEN.captures(html).map(|c| c[1].to_string())
}

pub fn extract_sesskey(html: &str) -> Option<String> {
    SESSKEY.captures(html).map(|c| c[1].to_string())
}

/// True when the page is Moodle's login form (never logged in, or session expired).
pub fn is_login_page(html: &str) -> bool {
    html.contains("name=\"logintoken\"") || html.contains("id=\"loginbtn\"")
}

pub fn login_error_message(html: &str) -> Option<String> {
    LOGIN_ERROR
        .captures(html)
        .map(|c| super::html::cell_text(&c[1]))
        .filter(|m| !m.is_empty())
}
