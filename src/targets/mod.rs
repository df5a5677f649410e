//! Publishing adapters, one per downstream platform, and the factory
//! building them from config.
//!
//! An adapter turns a [`PublishPayload`] plus an access token into the wire
//! calls of its platform and classifies the answer. Token acquisition,
//! refresh and retry belong to the dispatch layer.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

pub mod facebook;
pub mod instagram;
pub mod telegram;
pub mod twitter;

use crate::cache::credential::Credential;
use crate::config::{present, ServiceConfig};
use crate::dispatch::request::{PayloadKind, PublishPayload};
use crate::helpers::http::{describe_transport_error, truncate_body};
use crate::sources::oauth2::{OAuth2Client, TokenManager};
use crate::sources::persist::CredentialFile;
use crate::sources::TokenProvider;
use crate::utils::constants::GRAPH_OAUTH_ERROR_CODE;

use facebook::FacebookTarget;
use instagram::{InstagramSurface, InstagramTarget};
use telegram::TelegramTarget;
use twitter::TwitterTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetId {
    Twitter,
    InstagramFeed,
    InstagramStory,
    FacebookPage,
    TelegramChannel,
}

impl TargetId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetId::Twitter => "twitter",
            TargetId::InstagramFeed => "instagram_feed",
            TargetId::InstagramStory => "instagram_story",
            TargetId::FacebookPage => "facebook_page",
            TargetId::TelegramChannel => "telegram_channel",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TargetId::Twitter => "X (Twitter)",
            TargetId::InstagramFeed => "Instagram feed",
            TargetId::InstagramStory => "Instagram story",
            TargetId::FacebookPage => "Facebook page",
            TargetId::TelegramChannel => "Telegram channel",
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive width/height range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatioRange {
    pub min: f64,
    pub max: f64,
}

impl AspectRatioRange {
    pub fn contains(&self, ratio: f64) -> bool {
        ratio >= self.min && ratio <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capability {
    pub kinds: &'static [PayloadKind],
    /// shape constraint on images, checked before any network call
    pub aspect_ratio: Option<AspectRatioRange>,
    /// the platform fetches the image from a public URL
    pub needs_hosted_url: bool,
}

impl Capability {
    pub fn accepts(&self, kind: PayloadKind) -> bool {
        self.kinds.contains(&kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The token was rejected; a refreshed one may succeed.
    #[error("auth rejected: {0}")]
    AuthFailure(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub enum TargetKind {
    Twitter(TwitterTarget),
    Instagram(InstagramTarget),
    Facebook(FacebookTarget),
    Telegram(TelegramTarget),
}

impl TargetKind {
    pub fn id(&self) -> TargetId {
        match self {
            TargetKind::Twitter(_) => TargetId::Twitter,
            TargetKind::Instagram(s) => s.target_id(),
            TargetKind::Facebook(_) => TargetId::FacebookPage,
            TargetKind::Telegram(_) => TargetId::TelegramChannel,
        }
    }

    pub async fn publish(&self, payload: &PublishPayload, token: &str) -> Result<Published, PublishError> {
        match self {
            TargetKind::Twitter(s) => s.publish(payload, token).await,
            TargetKind::Instagram(s) => s.publish(payload, token).await,
            TargetKind::Facebook(s) => s.publish(payload, token).await,
            TargetKind::Telegram(s) => s.publish(payload, token).await,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TargetBinding {
    Ready { adapter: TargetKind, tokens: TokenProvider },
    /// what is missing, reported as the skip reason
    Incomplete(String),
}

/// One configured target; immutable after startup.
#[derive(Debug, Clone)]
pub struct PublishTarget {
    pub id: TargetId,
    pub capability: Capability,
    pub binding: TargetBinding,
}

impl PublishTarget {
    pub fn ready(adapter: TargetKind, tokens: TokenProvider, capability: Capability) -> Self {
        Self { id: adapter.id(), capability, binding: TargetBinding::Ready { adapter, tokens } }
    }

    pub fn incomplete(id: TargetId, capability: Capability, reason: impl Into<String>) -> Self {
        Self { id, capability, binding: TargetBinding::Incomplete(reason.into()) }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.binding, TargetBinding::Ready { .. })
    }
}

/// Builds every known target in a fixed order; incomplete ones are kept so
/// dispatches can report why they were skipped.
pub async fn build_targets(cfg: &ServiceConfig, client: &Client) -> anyhow::Result<Vec<PublishTarget>> {
    let mut targets = Vec::with_capacity(5);
    let safety_margin = cfg.settings.safety_margin_seconds();

    // twitter
    let capability = TwitterTarget::capability();
    match &cfg.targets.twitter {
        Some(twitter) if twitter.missing().is_empty() => {
            let mut initial = Credential::bootstrap(
                present(&twitter.access_token).unwrap_or_default().to_owned(),
                present(&twitter.refresh_token).unwrap_or_default().to_owned(),
            );
            let credential_file = present(&twitter.credentials_file).map(CredentialFile::new);
            if let Some(file) = &credential_file {
                if let Some(stored) = file.load().await? {
                    initial = stored;
                }
            }
            let oauth = OAuth2Client {
                token_url: twitter.token_url.clone(),
                client_id: present(&twitter.client_id).map(str::to_owned),
                client_secret: present(&twitter.client_secret).map(str::to_owned),
            };
            let mut manager = TokenManager::new(TargetId::Twitter.as_str(), client.clone(), oauth, initial, safety_margin);
            if let Some(file) = credential_file {
                manager = manager.with_credential_file(file);
            }
            let adapter = TargetKind::Twitter(TwitterTarget::new(client.clone(), twitter.api_base.clone()));
            targets.push(PublishTarget::ready(adapter, TokenProvider::Managed(Arc::new(manager)), capability));
        }
        Some(twitter) => targets.push(incomplete(TargetId::Twitter, capability, &twitter.missing())),
        None => targets.push(not_configured(TargetId::Twitter, capability)),
    }

    // instagram feed and story share one account
    for surface in [InstagramSurface::Feed, InstagramSurface::Story] {
        let id = surface.target_id();
        let ratio = cfg
            .targets
            .instagram
            .as_ref()
            .map(|ig| AspectRatioRange { min: ig.feed_aspect_ratio.min, max: ig.feed_aspect_ratio.max })
            .unwrap_or(instagram::FEED_ASPECT_RATIO);
        let capability = InstagramTarget::capability(surface, ratio);
        match &cfg.targets.instagram {
            Some(ig) if ig.missing().is_empty() => {
                let adapter = TargetKind::Instagram(InstagramTarget::new(
                    client.clone(),
                    ig.graph_base.clone(),
                    present(&ig.account_id).unwrap_or_default().to_owned(),
                    surface,
                ));
                let token = present(&ig.access_token).unwrap_or_default().to_owned();
                targets.push(PublishTarget::ready(adapter, TokenProvider::Static(token), capability));
            }
            Some(ig) => targets.push(incomplete(id, capability, &ig.missing())),
            None => targets.push(not_configured(id, capability)),
        }
    }

    // facebook page
    let capability = FacebookTarget::capability();
    match &cfg.targets.facebook {
        Some(fb) if fb.missing().is_empty() => {
            let adapter = TargetKind::Facebook(FacebookTarget::new(
                client.clone(),
                fb.graph_base.clone(),
                present(&fb.page_id).unwrap_or_default().to_owned(),
            ));
            let token = present(&fb.access_token).unwrap_or_default().to_owned();
            targets.push(PublishTarget::ready(adapter, TokenProvider::Static(token), capability));
        }
        Some(fb) => targets.push(incomplete(TargetId::FacebookPage, capability, &fb.missing())),
        None => targets.push(not_configured(TargetId::FacebookPage, capability)),
    }

    // telegram channel
    let capability = TelegramTarget::capability();
    let inbound_token = cfg.inbound.bot_token();
    match &cfg.targets.telegram_channel {
        Some(channel) if channel.missing(inbound_token).is_empty() => {
            let adapter = TargetKind::Telegram(TelegramTarget::new(
                client.clone(),
                channel.api_base.clone(),
                present(&channel.channel_id).unwrap_or_default().to_owned(),
            ));
            let token = channel.bot_token(inbound_token).unwrap_or_default().to_owned();
            targets.push(PublishTarget::ready(adapter, TokenProvider::Static(token), capability));
        }
        Some(channel) => targets.push(incomplete(TargetId::TelegramChannel, capability, &channel.missing(inbound_token))),
        None => targets.push(not_configured(TargetId::TelegramChannel, capability)),
    }

    for target in &targets {
        match &target.binding {
            TargetBinding::Ready { .. } => info!("target '{}' enabled", target.id),
            TargetBinding::Incomplete(reason) => warn!("target '{}' disabled: {}", target.id, reason),
        }
    }
    Ok(targets)
}

fn incomplete(id: TargetId, capability: Capability, missing: &[&str]) -> PublishTarget {
    PublishTarget::incomplete(id, capability, format!("missing credentials: {}", missing.join(", ")))
}

fn not_configured(id: TargetId, capability: Capability) -> PublishTarget {
    PublishTarget::incomplete(id, capability, "not configured")
}

/// Reads the body and maps the status: 2xx parses as JSON, 401 or a Graph
/// OAuthException is an auth failure, anything else is reported as is.
pub(crate) async fn read_json(response: Response) -> Result<Value, PublishError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    classify(status, &body)
}

pub(crate) fn classify(status: StatusCode, body: &str) -> Result<Value, PublishError> {
    if status.is_success() {
        return serde_json::from_str(body)
            .map_err(|err| PublishError::Other(format!("malformed response: {}", err)));
    }
    let detail = format!("{}: {}", status.as_u16(), truncate_body(body));
    if status == StatusCode::UNAUTHORIZED || is_graph_auth_error(body) {
        Err(PublishError::AuthFailure(detail))
    } else {
        Err(PublishError::Other(detail))
    }
}

fn is_graph_auth_error(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.pointer("/error/code").and_then(Value::as_i64))
        == Some(GRAPH_OAUTH_ERROR_CODE)
}

pub(crate) fn transport_error(err: reqwest::Error) -> PublishError {
    PublishError::Other(describe_transport_error(&err))
}

/// Ids come back as strings or numbers depending on the platform.
pub(crate) fn extract_id(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unauthorized_and_graph_code_190_are_auth_failures() {
        assert!(matches!(classify(StatusCode::UNAUTHORIZED, "{}"), Err(PublishError::AuthFailure(_))));

        let expired = json!({"error": {"message": "Session has expired", "type": "OAuthException", "code": 190}}).to_string();
        assert!(matches!(classify(StatusCode::BAD_REQUEST, &expired), Err(PublishError::AuthFailure(_))));

        let invalid = json!({"error": {"message": "Invalid parameter", "code": 100}}).to_string();
        match classify(StatusCode::BAD_REQUEST, &invalid) {
            Err(PublishError::Other(detail)) => assert!(detail.starts_with("400: ")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn success_with_non_json_body_is_malformed() {
        match classify(StatusCode::OK, "<html>") {
            Err(PublishError::Other(detail)) => assert!(detail.contains("malformed")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ids_are_read_from_strings_and_numbers() {
        let value = json!({"data": {"id": "123"}, "result": {"message_id": 7}, "id": ""});
        assert_eq!(extract_id(&value, "/data/id").as_deref(), Some("123"));
        assert_eq!(extract_id(&value, "/result/message_id").as_deref(), Some("7"));
        assert_eq!(extract_id(&value, "/id"), None);
        assert_eq!(extract_id(&value, "/missing"), None);
    }
}
