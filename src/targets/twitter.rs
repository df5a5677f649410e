use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::dispatch::request::{ImageData, PayloadKind, PublishPayload};
use crate::targets::{extract_id, read_json, transport_error, Capability, PublishError, Published};

/// X API v2 with an OAuth2 user-context bearer token.
#[derive(Debug, Clone)]
pub struct TwitterTarget {
    client: Client,
    api_base: String,
}

impl TwitterTarget {
    pub fn new(client: Client, api_base: String) -> Self {
        Self { client, api_base: api_base.trim_end_matches('/').to_owned() }
    }

    pub fn capability() -> Capability {
        Capability {
            kinds: &[PayloadKind::Text, PayloadKind::Image],
            aspect_ratio: None,
            needs_hosted_url: false,
        }
    }

    /// Media is uploaded again on every attempt; ids from a rejected attempt are not reused.
    pub async fn publish(&self, payload: &PublishPayload, token: &str) -> Result<Published, PublishError> {
        let mut tweet = Map::new();
        if let Some(text) = payload.text() {
            tweet.insert("text".to_owned(), Value::from(text));
        }
        if let Some(image) = &payload.image {
            let media_id = self.upload_media(image, token).await?;
            tweet.insert("media".to_owned(), json!({ "media_ids": [media_id] }));
        }
        if tweet.is_empty() {
            return Err(PublishError::Other("nothing to post".to_owned()));
        }

        let response = self
            .client
            .post(format!("{}/2/tweets", self.api_base))
            .bearer_auth(token)
            .json(&Value::Object(tweet))
            .send()
            .await
            .map_err(transport_error)?;
        let body = read_json(response).await?;
        let id = extract_id(&body, "/data/id");
        info!(tweet_id = ?id, "tweet created");
        Ok(Published { id })
    }

    async fn upload_media(&self, image: &ImageData, token: &str) -> Result<String, PublishError> {
        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|err| PublishError::Other(format!("invalid media type: {}", err)))?;
        let form = Form::new()
            .text("media_category", "tweet_image")
            .part("media", part);

        let response = self
            .client
            .post(format!("{}/2/media/upload", self.api_base))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let body = read_json(response).await?;
        let media_id = extract_id(&body, "/data/id")
            .or_else(|| extract_id(&body, "/media_id_string"))
            .ok_or_else(|| PublishError::Other("media upload returned no id".to_owned()))?;
        debug!(media_id = %media_id, "media uploaded");
        Ok(media_id)
    }
}
