//! Telegram Bot API long polling: turns incoming messages into
//! [`DispatchRequest`]s and answers each with the dispatch summary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::collaborators::TelegramInboundConfig;
use crate::config::present;
use crate::dispatch::coordinator::DispatchCoordinator;
use crate::dispatch::request::{DispatchRequest, ImageAttachment, SourceMetadata};
use crate::helpers::http::truncate_body;
use crate::observability::metrics::get_metrics;
use crate::utils::constants::INBOUND_ERROR_BACKOFF_SECS;

const HELP_TEXT: &str = "Hello! Send me a photo with a caption, or a text message, \
and I will post it to every connected account.";
const UNSUPPORTED_TEXT: &str = "I can only process photo or text messages. Please send a photo or text.";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

impl Message {
    /// Commands are answered by the bot and never published.
    pub fn is_command(&self) -> bool {
        let starts_with_command = self
            .entities
            .first()
            .is_some_and(|e| e.kind == "bot_command" && e.offset == 0);
        starts_with_command || self.text.as_deref().is_some_and(|t| t.trim_start().starts_with('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

/// Bot API calls used by the transport.
#[derive(Clone)]
pub struct BotApi {
    client: Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for BotApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApi").field("api_base", &self.api_base).finish_non_exhaustive()
    }
}

impl BotApi {
    pub fn new(client: Client, api_base: String, token: String) -> Self {
        Self { client, api_base: api_base.trim_end_matches('/').to_owned(), token }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let response = self
            .client
            .post(format!("{}/bot{}/{}", self.api_base, self.token, method))
            .json(&params)
            .send()
            .await
            .map_err(|err| anyhow!("{} failed: {}", method, err.without_url()))?;
        let status = response.status();
        let body = response.text().await.map_err(|err| anyhow!("{} failed: {}", method, err.without_url()))?;
        let parsed: ApiResponse<T> = serde_json::from_str(&body)
            .with_context(|| format!("{} returned {}: {}", method, status.as_u16(), truncate_body(&body)))?;
        match parsed {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { description, .. } => Err(anyhow!(
                "{} rejected with {}: {}",
                method,
                status.as_u16(),
                description.unwrap_or_default()
            )),
        }
    }

    pub async fn get_me(&self) -> Result<Option<String>> {
        let me: BotUser = self.call("getMe", json!({})).await?;
        Ok(me.username)
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self.call("deleteWebhook", json!({})).await?;
        Ok(())
    }

    pub async fn get_updates(&self, offset: i64, timeout_seconds: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({ "offset": offset, "timeout": timeout_seconds, "allowed_updates": ["message"] }),
        )
        .await
    }

    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file: File = self.call("getFile", json!({ "file_id": file_id })).await?;
        let file_path = file.file_path.ok_or_else(|| anyhow!("getFile returned no file_path"))?;
        let response = self
            .client
            .get(format!("{}/file/bot{}/{}", self.api_base, self.token, file_path))
            .send()
            .await
            .map_err(|err| anyhow!("file download failed: {}", err.without_url()))?;
        if !response.status().is_success() {
            return Err(anyhow!("file download failed with {}", response.status().as_u16()));
        }
        let bytes = response.bytes().await.map_err(|err| anyhow!("file download failed: {}", err.without_url()))?;
        Ok(bytes.to_vec())
    }

    pub async fn send_message(&self, chat_id: i64, text: &str, reply_to: Option<i64>) -> Result<()> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if let Some(message_id) = reply_to {
            params["reply_to_message_id"] = json!(message_id);
        }
        let _: Value = self.call("sendMessage", params).await?;
        Ok(())
    }
}

pub struct TelegramInbound {
    api: BotApi,
    poll_timeout_seconds: u64,
    allowed_chat_ids: Vec<i64>,
    temp_dir: PathBuf,
}

// the api field holds the bot token, so it is left out
impl std::fmt::Debug for TelegramInbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramInbound")
            .field("poll_timeout_seconds", &self.poll_timeout_seconds)
            .field("allowed_chat_ids", &self.allowed_chat_ids)
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}

impl TelegramInbound {
    /// Fails when the bot token is missing or rejected: nothing can be received then.
    pub async fn connect(cfg: &TelegramInboundConfig, client: Client, temp_dir: PathBuf) -> Result<Self> {
        let token = present(&cfg.bot_token)
            .ok_or_else(|| anyhow!("inbound telegram bot_token is not set"))?
            .to_owned();
        let api = BotApi::new(client, cfg.api_base.clone(), token);

        let username = api.get_me().await.context("telegram bot token check")?;
        info!("telegram bot running as @{}", username.unwrap_or_default());

        // polling and webhooks are exclusive
        if let Err(err) = api.delete_webhook().await {
            warn!("could not delete webhook: {:#}", err);
        }

        if cfg.allowed_chat_ids.is_empty() {
            warn!("inbound.telegram.allowed_chat_ids is empty, messages from any chat will be published");
        }

        Ok(Self {
            api,
            poll_timeout_seconds: cfg.poll_timeout_seconds,
            allowed_chat_ids: cfg.allowed_chat_ids.clone(),
            temp_dir,
        })
    }

    /// Polls until SIGINT/SIGTERM, then waits for dispatches already started.
    pub async fn run(self, coordinator: Arc<DispatchCoordinator>) -> Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let this = Arc::new(self);
        let mut handlers = JoinSet::new();
        let mut offset = 0;

        loop {
            while handlers.try_join_next().is_some() {}

            let polled = tokio::select! {
                _ = sigint.recv() => { info!("received SIGINT, stop polling"); break; }
                _ = sigterm.recv() => { info!("received SIGTERM, stop polling"); break; }
                polled = this.poll_once(offset, &coordinator, &mut handlers) => polled,
            };

            match polled {
                Ok(next) => offset = next,
                Err(err) => {
                    error!("polling failed: {:#}, retrying in {}s", err, INBOUND_ERROR_BACKOFF_SECS);
                    tokio::time::sleep(Duration::from_secs(INBOUND_ERROR_BACKOFF_SECS)).await;
                }
            }
        }

        info!("waiting for {} in-flight dispatches", handlers.len());
        handlers.join_all().await;
        Ok(())
    }

    /// One getUpdates round; returns the offset past every update received.
    pub(crate) async fn poll_once(
        self: &Arc<Self>,
        offset: i64,
        coordinator: &Arc<DispatchCoordinator>,
        handlers: &mut JoinSet<()>,
    ) -> Result<i64> {
        let metrics = get_metrics().await;
        let mut next = offset;
        for update in self.api.get_updates(offset, self.poll_timeout_seconds).await? {
            next = next.max(update.update_id + 1);
            metrics.inbound_updates.inc();
            let Some(message) = update.message else {
                debug!(update_id = update.update_id, "update without message ignored");
                continue;
            };
            let this = self.clone();
            let coordinator = coordinator.clone();
            handlers.spawn(async move { this.handle_message(message, &coordinator).await });
        }
        Ok(next)
    }

    pub(crate) async fn handle_message(&self, message: Message, coordinator: &DispatchCoordinator) {
        if !self.allowed_chat_ids.is_empty() && !self.allowed_chat_ids.contains(&message.chat.id) {
            warn!(chat_id = message.chat.id, "message from chat not in allowed_chat_ids ignored");
            return;
        }
        info!(
            chat_id = message.chat.id,
            username = ?message.chat.username,
            has_photo = !message.photo.is_empty(),
            "message received"
        );

        let reply = if message.is_command() {
            debug!(chat_id = message.chat.id, "command answered with help");
            HELP_TEXT.to_owned()
        } else {
            self.dispatch_reply(&message, coordinator).await
        };

        if let Err(err) = self.api.send_message(message.chat.id, &reply, Some(message.message_id)).await {
            error!("reply to chat {} failed: {:#}", message.chat.id, err);
        }
    }

    async fn dispatch_reply(&self, message: &Message, coordinator: &DispatchCoordinator) -> String {
        match self.to_request(message).await {
            Ok(request) if request.payload_kind().is_none() => UNSUPPORTED_TEXT.to_owned(),
            Ok(request) => coordinator.dispatch(request).await.to_string(),
            Err(err) => {
                error!("could not fetch attachment: {:#}", err);
                format!("❌ Could not fetch your photo: {}", err)
            }
        }
    }

    /// Downloads the largest photo size into a temp file owned by the request.
    pub(crate) async fn to_request(&self, message: &Message) -> Result<DispatchRequest> {
        let source = SourceMetadata {
            chat_id: message.chat.id,
            message_id: message.message_id,
            username: message.chat.username.clone(),
        };

        let Some(photo) = message
            .photo
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
        else {
            return Ok(DispatchRequest {
                text: message.text.clone(),
                image: None,
                source,
            });
        };

        let bytes = self.api.download_file(&photo.file_id).await?;
        let path = tempfile::Builder::new()
            .prefix("relay_")
            .suffix(".jpg")
            .tempfile_in(&self.temp_dir)
            .with_context(|| format!("creating temp file in '{}'", self.temp_dir.display()))?
            .into_temp_path();
        let attachment = ImageAttachment::new(path, Some(photo.width), Some(photo.height));
        tokio::fs::write(attachment.path(), &bytes).await?;
        debug!("photo downloaded to {}", attachment.path().display());

        let caption = message.caption.clone().or_else(|| message.text.clone());
        Ok(DispatchRequest::image(attachment, caption, source))
    }
}
