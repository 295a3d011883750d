// moodlesync-core/src/infrastructure/sheets/auth.rs
//
// Service-account OAuth: a signed RS256 assertion exchanged for a bearer token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SyncError;
use crate::infrastructure::error::InfrastructureError;

pub const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The fields of a service-account JSON key this adapter needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(content: &str) -> Result<Self, InfrastructureError> {
        serde_json::from_str(content)
            .map_err(|e| InfrastructureError::Credentials(format!("malformed key file: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, InfrastructureError> {
        let content = fs::read_to_string(path).map_err(|e| {
            InfrastructureError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct TokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey, client: Client) -> Result<Self, InfrastructureError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| InfrastructureError::Credentials(format!("private_key: {}", e)))?;
        Ok(Self {
            key,
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Signed JWT assertion valid for one hour from `now`.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, InfrastructureError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| InfrastructureError::Credentials(format!("signing assertion: {}", e)))
    }

    pub async fn access_token(&self) -> Result<String, SyncError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref()
            && token.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
        {
            return Ok(token.value.clone());
        }

        let assertion = self.assertion(now)?;
        let form = [("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())];
        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| InfrastructureError::Write(format!("token exchange: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| InfrastructureError::Write(format!("token exchange: {}", e)))?;
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(InfrastructureError::Authentication(format!(
                "token exchange for {} rejected (HTTP {}): {}",
                self.key.client_email, status, body
            ))
            .into());
        }
        if !status.is_success() {
            return Err(
                InfrastructureError::Write(format!("token exchange: HTTP {}: {}", status, body))
                    .into(),
            );
        }

        let reply: TokenReply = serde_json::from_str(&body)
            .map_err(|e| InfrastructureError::Write(format!("token reply: {}", e)))?;
        debug!(expires_in = reply.expires_in, "Google access token obtained");

        *cached = Some(CachedToken {
            value: reply.access_token.clone(),
            expires_at: now + Duration::seconds(reply.expires_in),
        });
        Ok(reply.access_token)
    }
}
