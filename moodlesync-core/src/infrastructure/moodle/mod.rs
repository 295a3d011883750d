// moodlesync-core/src/infrastructure/moodle/mod.rs
//
// Moodle adapter: form login with cookies, CSV export of feedback responses, assignment grading
// table, and the grader report AJAX call for the course roster.

pub mod html;
pub mod parser;
pub mod session;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::plan::SourceSpec;
use crate::domain::record::{RosterEntry, SourceKind};
use crate::error::SyncError;
use crate::infrastructure::config::MoodleConfig;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::{RawPayload, SourceFetcher};

pub use parser::MoodleRecordParser;
pub use session::MoodleSession;

const USER_AGENT: &str = "Mozilla/5.0 (moodlesync)";
const ROSTER_METHOD: &str = "gradereport_grader_get_users_in_report";

pub struct MoodleFetcher {
    client: Client,
    config: MoodleConfig,
    session: Mutex<Option<MoodleSession>>,
}

#[derive(Debug, Deserialize)]
struct AjaxReply {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    data: Option<RosterData>,
    #[serde(default)]
    exception: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RosterData {
    #[serde(default)]
    users: Vec<RosterUser>,
}

#[derive(Debug, Deserialize)]
struct RosterUser {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    fullname: Option<String>,
}

fn transient(context: &str, err: impl std::fmt::Display) -> SyncError {
    SyncError::Infrastructure(InfrastructureError::TransientFetch(format!(
        "{}: {}",
        context, err
    )))
}

impl MoodleFetcher {
    pub fn new(config: MoodleConfig) -> Result<Self, InfrastructureError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| InfrastructureError::TransientFetch(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn read_body(context: &str, resp: Response) -> Result<String, SyncError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(transient(context, format!("HTTP {}", status)));
        }
        resp.text().await.map_err(|e| transient(context, e))
    }

    async fn get_page(&self, context: &str, path: &str, query: &[(&str, &str)]) -> Result<String, SyncError> {
        let resp = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| transient(context, e))?;
        Self::read_body(context, resp).await
    }

    #[instrument(skip(self), fields(user = %self.config.username))]
    async fn login(&self) -> Result<MoodleSession, SyncError> {
        let login_page = self.get_page("login page", "/login/index.php", &[]).await?;
        // A login page without a token is a partial load, not a rejection.
        let token = session::extract_login_token(&login_page)
            .ok_or_else(|| transient("login page", "logintoken not found"))?;

        let form = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
            ("anchor", ""),
            ("logintoken", token.as_str()),
        ];
        let resp = self
            .client
            .post(self.url("/login/index.php"))
            .form(&form)
            .send()
            .await
            .map_err(|e| transient("login submit", e))?;
        let after_submit = Self::read_body("login submit", resp).await?;
        if session::is_login_page(&after_submit)
            && let Some(msg) = session::login_error_message(&after_submit)
        {
            return Err(InfrastructureError::Authentication(msg).into());
        }

        // The dashboard settles the session and carries the sesskey.
        let dashboard = self.get_page("dashboard", "/my/", &[]).await?;
        if session::is_login_page(&dashboard) {
            return Err(InfrastructureError::Authentication(format!(
                "Moodle kept showing the login form for user '{}'",
                self.config.username
            ))
            .into());
        }
        let sesskey = session::extract_sesskey(&dashboard).ok_or_else(|| {
            InfrastructureError::Authentication("no sesskey on the dashboard after login".into())
        })?;

        info!("🔐 Logged into Moodle");
        Ok(MoodleSession { sesskey })
    }

    async fn sesskey(&self) -> Result<String, SyncError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.sesskey.clone());
        }
        let session = self.login().await?;
        let key = session.sesskey.clone();
        *guard = Some(session);
        Ok(key)
    }

    async fn expire_session(&self) {
        *self.session.lock().await = None;
    }

    /// Show all participants on one grading page. Moodle keeps the choice as a user preference.
    async fn expand_grading_page(&self, source: &SourceSpec, sesskey: &str) {
        let form = [
            ("id", source.id.as_str()),
            ("action", "saveoptions"),
            ("sesskey", sesskey),
            ("_qf__mod_assign_grading_options_form", "1"),
            ("perpage", "-1"),
        ];
        let result = self
            .client
            .post(self.url("/mod/assign/view.php"))
            .form(&form)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => debug!(source = %source.label, status = %resp.status(), "Grading options not saved"),
            Err(e) => debug!(source = %source.label, error = %e, "Grading options not saved"),
        }
    }
}

#[async_trait]
impl SourceFetcher for MoodleFetcher {
    async fn authenticate(&self) -> Result<(), SyncError> {
        self.sesskey().await.map(|_| ())
    }

    #[instrument(skip(self, source), fields(source = %source.label, id = %source.id))]
    async fn fetch_source(&self, source: &SourceSpec) -> Result<RawPayload, SyncError> {
        let sesskey = self.sesskey().await?;

        let body = match source.kind {
            SourceKind::Survey => {
                self.get_page(
                    "survey export",
                    "/mod/feedback/show_entries.php",
                    &[("id", source.id.as_str()), ("download", "csv")],
                )
                .await?
            }
            SourceKind::Deliverable => {
                self.expand_grading_page(source, &sesskey).await;
                self.get_page(
                    "grading page",
                    "/mod/assign/view.php",
                    &[("id", source.id.as_str()), ("action", "grading")],
                )
                .await?
            }
        };

        if session::is_login_page(&body) {
            warn!("Moodle session expired, logging in again on next attempt");
            self.expire_session().await;
            return Err(transient("session", "expired (login form returned)"));
        }

        debug!(bytes = body.len(), "Source downloaded");
        Ok(RawPayload {
            kind: source.kind,
            body,
        })
    }

    #[instrument(skip(self), fields(course = self.config.course_id))]
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, SyncError> {
        let sesskey = self.sesskey().await?;
        let payload = json!([{
            "index": 0,
            "methodname": ROSTER_METHOD,
            "args": { "courseid": self.config.course_id },
        }]);

        let resp = self
            .client
            .post(self.url("/lib/ajax/service.php"))
            .query(&[("sesskey", sesskey.as_str()), ("info", ROSTER_METHOD)])
            .json(&payload)
            .send()
            .await
            .map_err(|e| transient("roster", e))?;

        if resp.status() == StatusCode::FORBIDDEN {
            self.expire_session().await;
        }
        let body = Self::read_body("roster", resp).await?;
        let replies: Vec<AjaxReply> = serde_json::from_str(&body)
            .map_err(|e| InfrastructureError::Parse(format!("roster reply: {}", e)))?;
        let reply = replies
            .into_iter()
            .next()
            .ok_or_else(|| InfrastructureError::Parse("roster reply is empty".into()))?;

        if reply.error {
            // Usually an invalid sesskey; the next attempt logs in again.
            self.expire_session().await;
            let detail = reply
                .exception
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".into());
            return Err(transient("roster", detail));
        }

        let users = reply.data.map(|d| d.users).unwrap_or_default();
        Ok(users
            .into_iter()
            .filter_map(|u| {
                let email = u.email.filter(|e| !e.trim().is_empty())?;
                Some(RosterEntry {
                    email,
                    full_name: u.fullname.unwrap_or_default(),
                })
            })
            .collect())
    }
}
