use reqwest::Client;
use tracing::info;

use crate::dispatch::request::{PayloadKind, PublishPayload};
use crate::targets::{extract_id, read_json, transport_error, Capability, PublishError, Published};

/// Page photo post in one call; the page fetches the image by URL.
#[derive(Debug, Clone)]
pub struct FacebookTarget {
    client: Client,
    graph_base: String,
    page_id: String,
}

impl FacebookTarget {
    pub fn new(client: Client, graph_base: String, page_id: String) -> Self {
        Self { client, graph_base: graph_base.trim_end_matches('/').to_owned(), page_id }
    }

    pub fn capability() -> Capability {
        Capability {
            kinds: &[PayloadKind::Image],
            aspect_ratio: None,
            needs_hosted_url: true,
        }
    }

    pub async fn publish(&self, payload: &PublishPayload, token: &str) -> Result<Published, PublishError> {
        let image_url = payload
            .image
            .as_ref()
            .and_then(|image| image.hosted_url.as_deref())
            .ok_or_else(|| PublishError::Other("no hosted url".to_owned()))?;

        let mut form = vec![("url", image_url), ("access_token", token)];
        if let Some(caption) = payload.text() {
            form.push(("caption", caption));
        }

        let response = self
            .client
            .post(format!("{}/{}/photos", self.graph_base, self.page_id))
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;
        let body = read_json(response).await?;
        let id = extract_id(&body, "/post_id").or_else(|| extract_id(&body, "/id"));
        if id.is_none() {
            return Err(PublishError::Other(format!("page post returned no id: {}", body)));
        }
        info!(page_id = %self.page_id, post_id = ?id, "facebook page photo posted");
        Ok(Published { id })
    }
}
