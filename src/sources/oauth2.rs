//! OAuth2 refresh-token lifecycle for one identity.
//!
//! The manager hands out a usable access token, refreshing it proactively
//! (inside the safety margin) or reactively (after a target rejected it).
//! Every refresh for the identity runs behind one async lock, and callers
//! that waited on it re-check the store before issuing their own request.

use std::fmt;

use base64::Engine;
use http::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::credential::Credential;
use crate::cache::credential_store::CredentialStore;
use crate::helpers::http::{describe_transport_error, truncate_body};
use crate::helpers::time::{get_instant, now_i64};
use crate::observability::metrics::get_metrics;
use crate::sources::persist::CredentialFile;
use crate::utils::constants::DEFAULT_TOKEN_LIFETIME_SECS;

static OK_MSG: &str = "ok";
static DENIED_MSG: &str = "denied";
static ERROR_MSG: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("credentials unavailable: {0}")]
    CredentialsUnavailable(String),
    #[error("refresh denied with status {status}: {body}")]
    RefreshDenied { status: u16, body: String },
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

/// Client identity registered with the provider.
#[derive(Clone)]
pub struct OAuth2Client {
    pub token_url: String,
    pub client_id: Option<String>,
    /// Confidential clients authenticate with HTTP Basic; public ones omit it.
    pub client_secret: Option<String>,
}

impl fmt::Debug for OAuth2Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Client")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug)]
pub struct TokenManager {
    identity: String,
    client: Client,
    oauth: OAuth2Client,
    store: CredentialStore,
    refresh_lock: Mutex<()>,
    safety_margin_seconds: u64,
    credential_file: Option<CredentialFile>,
}

impl TokenManager {
    pub fn new(
        identity: impl Into<String>,
        client: Client,
        oauth: OAuth2Client,
        initial: Credential,
        safety_margin_seconds: u64,
    ) -> Self {
        Self {
            identity: identity.into(),
            client,
            oauth,
            store: CredentialStore::new(initial),
            refresh_lock: Mutex::new(()),
            safety_margin_seconds,
            credential_file: None,
        }
    }

    pub fn with_credential_file(mut self, credential_file: CredentialFile) -> Self {
        self.credential_file = Some(credential_file);
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub async fn credential(&self) -> Credential {
        self.store.snapshot().await
    }

    /// Current token if it is outside the safety margin, otherwise a refreshed one.
    pub async fn get_token(&self) -> Result<String, TokenError> {
        let current = self.store.snapshot().await;
        self.ensure_configured(&current)?;
        if current.is_usable_at(now_i64(), self.safety_margin_seconds) {
            return Ok(current.access_token);
        }

        let _guard = self.refresh_lock.lock().await;
        let current = self.store.snapshot().await;
        if current.is_usable_at(now_i64(), self.safety_margin_seconds) {
            debug!(identity = %self.identity, "token was refreshed while waiting for the lock");
            return Ok(current.access_token);
        }
        self.refresh_locked(current).await
    }

    /// Unconditional refresh.
    pub async fn force_refresh(&self) -> Result<String, TokenError> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.store.snapshot().await;
        self.ensure_configured(&current)?;
        self.refresh_locked(current).await
    }

    /// Refresh after a target rejected `rejected`. When another caller has already
    /// replaced that token, its replacement is returned without a new request.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String, TokenError> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.store.snapshot().await;
        self.ensure_configured(&current)?;
        if current.access_token != rejected
            && current.is_usable_at(now_i64(), self.safety_margin_seconds)
        {
            debug!(identity = %self.identity, "rejected token already replaced");
            return Ok(current.access_token);
        }
        self.refresh_locked(current).await
    }

    fn ensure_configured(&self, current: &Credential) -> Result<(), TokenError> {
        if self.client_id().is_none() {
            return Err(TokenError::CredentialsUnavailable(format!("{}: client_id is not configured", self.identity)));
        }
        if current.refresh_token.is_empty() {
            return Err(TokenError::CredentialsUnavailable(format!("{}: refresh_token is not configured", self.identity)));
        }
        Ok(())
    }

    fn client_id(&self) -> Option<&str> {
        self.oauth.client_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Caller holds `refresh_lock`. The store is written once, and only on success.
    async fn refresh_locked(&self, current: Credential) -> Result<String, TokenError> {
        let metrics = get_metrics().await;
        let start = get_instant();
        let client_id = self.client_id().unwrap_or_default();

        info!(identity = %self.identity, "refreshing access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.as_str()),
            ("client_id", client_id),
        ];
        let mut request = self
            .client
            .post(&self.oauth.token_url)
            .header(ACCEPT, "application/json")
            .form(&form);
        if let Some(secret) = self.oauth.client_secret.as_deref().filter(|s| !s.is_empty()) {
            request = request.header(AUTHORIZATION, basic_auth(client_id, secret));
        }

        let outcome = self.exchange(request).await;
        let result = match &outcome {
            Ok(_) => OK_MSG,
            Err(TokenError::RefreshDenied { .. }) => DENIED_MSG,
            Err(_) => ERROR_MSG,
        };
        metrics.token_refreshes.with_label_values(&[self.identity.as_str(), result]).inc();
        metrics.token_refresh_duration.with_label_values(&[self.identity.as_str()]).observe(start.elapsed().as_secs_f64());

        let grant = outcome.inspect_err(|err| {
            warn!(identity = %self.identity, error = %err, "token refresh failed, keeping last known credential");
        })?;

        let rotated = grant.refresh_token.as_deref().is_some_and(|t| !t.is_empty());
        let refreshed = current.refreshed(
            grant.access_token,
            grant.refresh_token,
            grant.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
            now_i64(),
        );
        self.store.replace(refreshed.clone()).await;
        info!(identity = %self.identity, expires_at = ?refreshed.expires_at, rotated, "access token refreshed");

        if let Some(file) = &self.credential_file {
            if let Err(err) = file.store(&refreshed).await {
                warn!(identity = %self.identity, error = %err, "refreshed credential not persisted");
            }
        }
        Ok(refreshed.access_token)
    }

    async fn exchange(&self, request: reqwest::RequestBuilder) -> Result<TokenResponse, TokenError> {
        let response = request
            .send()
            .await
            .map_err(|err| TokenError::Transport(describe_transport_error(&err)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| TokenError::Transport(describe_transport_error(&err)))?;

        if !status.is_success() {
            return Err(TokenError::RefreshDenied { status: status.as_u16(), body: truncate_body(&body) });
        }

        let grant: TokenResponse = serde_json::from_str(&body)
            .map_err(|err| TokenError::MalformedResponse(err.to_string()))?;
        if grant.access_token.is_empty() {
            return Err(TokenError::MalformedResponse("empty access_token".to_owned()));
        }
        Ok(grant)
    }
}

fn basic_auth(client_id: &str, client_secret: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", client_id, client_secret));
    format!("Basic {}", encoded)
}

#[cfg(test)]
mod tests {
    use super::basic_auth;

    #[test]
    fn basic_auth_encodes_client_pair() {
        assert_eq!(basic_auth("id", "secret"), "Basic aWQ6c2VjcmV0");
    }
}
