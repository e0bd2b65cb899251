//! HTTP client for the School 21 open API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::DirectoryConfig;
use crate::directory::credential::{Clock, CredentialCache, IssuedToken, SystemClock};
use crate::directory::{DirectoryProfile, IdentityDirectory, Lookup};
use crate::error::DirectoryError;

/// Lifetime assumed when the auth endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 300;

/// Upper bound on how much of an error body ends up in logs.
const MAX_LOGGED_BODY: usize = 512;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Directory client with a shared credential cache.
pub struct DirectoryClient {
    config: DirectoryConfig,
    http: reqwest::Client,
    credentials: CredentialCache,
}

impl DirectoryClient {
    pub fn new(config: DirectoryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a client whose credential expiry is judged against `clock`.
    pub fn with_clock(config: DirectoryConfig, clock: Arc<dyn Clock>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build directory HTTP client ({e}), using defaults");
                reqwest::Client::new()
            });
        let credentials = CredentialCache::new(config.refresh_margin, clock);
        Self {
            config,
            http,
            credentials,
        }
    }

    /// The credential cache, shared by every lookup on this client.
    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    /// Obtain a fresh token with the password grant.
    async fn acquire_credential(&self) -> Result<IssuedToken, DirectoryError> {
        let (Some(username), Some(password)) = (&self.config.username, &self.config.password)
        else {
            return Err(DirectoryError::NotConfigured(
                self.config.missing_secrets().join(", "),
            ));
        };

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("username", username.expose_secret()),
            ("password", password.expose_secret()),
            ("grant_type", "password"),
        ];

        let resp = self
            .http
            .post(&self.config.auth_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| DirectoryError::CredentialFailed(format!("request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(
                status = %status,
                body = %truncate(&body),
                "Directory credential request rejected"
            );
            return Err(DirectoryError::CredentialFailed(format!("HTTP {status}")));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| DirectoryError::CredentialFailed(format!("malformed token response: {e}")))?;

        tracing::info!(
            expires_in = token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
            "Directory credential acquired"
        );
        Ok(IssuedToken {
            token: SecretString::from(token.access_token),
            expires_in: Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)),
        })
    }

    fn participant_url(&self, handle: &str) -> String {
        format!(
            "{}/participants/{handle}",
            self.config.api_base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl IdentityDirectory for DirectoryClient {
    async fn resolve(&self, handle: &str) -> Result<Lookup, DirectoryError> {
        let token = self
            .credentials
            .get_or_refresh(|| self.acquire_credential())
            .await?;

        let resp = self
            .http
            .get(self.participant_url(handle))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| DirectoryError::RequestFailed(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {
                let profile: DirectoryProfile = resp
                    .json()
                    .await
                    .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;
                tracing::debug!(handle, login = %profile.login, "Directory profile found");
                Ok(Lookup::Found(profile))
            }
            StatusCode::NOT_FOUND => {
                tracing::debug!(handle, "Directory profile not found");
                Ok(Lookup::NotFound)
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                tracing::warn!(
                    handle,
                    status = %status,
                    body = %truncate(&body),
                    "Directory lookup failed"
                );
                if status == StatusCode::UNAUTHORIZED {
                    self.credentials.invalidate().await;
                }
                Err(DirectoryError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: truncate(&body),
                })
            }
        }
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_LOGGED_BODY).collect()
}
