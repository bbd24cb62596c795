//! OAuth access tokens for the Sheets API.
//!
//! Service accounts authenticate with a self-signed RS256 JWT exchanged at
//! Google's token endpoint (the two-legged "JWT bearer" grant).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use faqbot_core::SheetError;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not read service account key `{path}`: {source}")]
    ReadKey { path: PathBuf, source: std::io::Error },
    #[error("could not parse service account key `{path}`: {source}")]
    ParseKey { path: PathBuf, source: serde_json::Error },
    #[error("invalid service account private key: {0}")]
    InvalidKey(String),
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("could not build HTTP client: {0}")]
    HttpClient(String),
}

impl From<AuthError> for SheetError {
    fn from(error: AuthError) -> Self {
        SheetError::RemoteService(error.to_string())
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, AuthError>;
}

/// Serves one pre-issued token.
pub struct StaticTokenSource {
    token: SecretString,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: SecretString::from(token.into()) }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<SecretString, AuthError> {
        Ok(self.token.clone())
    }
}

/// The fields of a Google service account JSON key that the exchange needs.
#[derive(Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| AuthError::ReadKey { path: path.to_path_buf(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| AuthError::ParseKey { path: path.to_path_buf(), source })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    token: SecretString,
    refresh_after: DateTime<Utc>,
}

/// Exchanges signed assertions for access tokens and caches each token
/// until shortly before it expires.
pub struct ServiceAccountTokenSource {
    http: Client,
    client_email: String,
    token_uri: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    pub fn from_file(path: &Path, http: Client) -> Result<Self, AuthError> {
        Self::from_key(ServiceAccountKey::from_file(path)?, http)
    }

    pub fn from_key(key: ServiceAccountKey, http: Client) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|error| AuthError::InvalidKey(error.to_string()))?;

        Ok(Self {
            http,
            client_email: key.client_email,
            token_uri: key.token_uri,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|error| AuthError::InvalidKey(error.to_string()))
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, AuthError> {
        let assertion = self.signed_assertion(now)?;
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|error| AuthError::Exchange(format!("token request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Exchange(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = response.json().await.map_err(|error| {
            AuthError::Exchange(format!("failed to decode token response: {error}"))
        })?;
        if token.access_token.is_empty() {
            return Err(AuthError::Exchange("token endpoint returned empty access token".into()));
        }

        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        debug!(
            event_name = "sheets.auth.token_refreshed",
            client_email = %self.client_email,
            expires_in = lifetime,
            "service account token refreshed"
        );

        Ok(CachedToken {
            token: SecretString::from(token.access_token),
            refresh_after: now + Duration::seconds((lifetime - REFRESH_MARGIN_SECS).max(0)),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<SecretString, AuthError> {
        // Held across the exchange so concurrent callers share one refresh.
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(current) = cached.as_ref() {
            if now < current.refresh_after {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.exchange(now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
