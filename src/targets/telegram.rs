use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::dispatch::request::{PayloadKind, PublishPayload};
use crate::targets::{extract_id, read_json, transport_error, Capability, PublishError, Published};

/// Bot API channel post. The token is the bot token and is part of the URL path.
#[derive(Debug, Clone)]
pub struct TelegramTarget {
    client: Client,
    api_base: String,
    channel_id: String,
}

impl TelegramTarget {
    pub fn new(client: Client, api_base: String, channel_id: String) -> Self {
        Self { client, api_base: api_base.trim_end_matches('/').to_owned(), channel_id }
    }

    pub fn capability() -> Capability {
        Capability {
            kinds: &[PayloadKind::Text, PayloadKind::Image],
            aspect_ratio: None,
            needs_hosted_url: false,
        }
    }

    pub async fn publish(&self, payload: &PublishPayload, token: &str) -> Result<Published, PublishError> {
        let request = match &payload.image {
            Some(image) => {
                let part = Part::bytes(image.bytes.to_vec())
                    .file_name(image.file_name.clone())
                    .mime_str(&image.mime_type)
                    .map_err(|err| PublishError::Other(format!("invalid media type: {}", err)))?;
                let mut form = Form::new()
                    .text("chat_id", self.channel_id.clone())
                    .part("photo", part);
                if let Some(caption) = payload.text() {
                    form = form.text("caption", caption.to_owned());
                }
                self.client
                    .post(format!("{}/bot{}/sendPhoto", self.api_base, token))
                    .multipart(form)
            }
            None => {
                let text = payload
                    .text()
                    .ok_or_else(|| PublishError::Other("nothing to post".to_owned()))?;
                self.client
                    .post(format!("{}/bot{}/sendMessage", self.api_base, token))
                    .json(&json!({ "chat_id": self.channel_id, "text": text }))
            }
        };

        // reqwest errors carry the URL, which contains the bot token
        let response = request.send().await.map_err(|err| transport_error(err.without_url()))?;
        let body = read_json(response).await?;
        let id = extract_id(&body, "/result/message_id");
        info!(channel_id = %self.channel_id, message_id = ?id, "telegram channel post sent");
        Ok(Published { id })
    }
}
