use reqwest::Client;
use tracing::{debug, info};

use crate::dispatch::request::{PayloadKind, PublishPayload};
use crate::targets::{extract_id, read_json, transport_error, AspectRatioRange, Capability, PublishError, Published, TargetId};
use crate::utils::constants::{INSTAGRAM_FEED_MAX_RATIO, INSTAGRAM_FEED_MIN_RATIO};

pub const FEED_ASPECT_RATIO: AspectRatioRange = AspectRatioRange {
    min: INSTAGRAM_FEED_MIN_RATIO,
    max: INSTAGRAM_FEED_MAX_RATIO,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstagramSurface {
    Feed,
    /// no caption, no shape constraint
    Story,
}

impl InstagramSurface {
    pub fn target_id(&self) -> TargetId {
        match self {
            InstagramSurface::Feed => TargetId::InstagramFeed,
            InstagramSurface::Story => TargetId::InstagramStory,
        }
    }
}

/// Graph API content publishing: create a media container from a public
/// image URL, then publish the container.
///
/// A failed publish leaves the container behind on the platform; it is
/// named in the failure for diagnostics and never deleted or reused.
#[derive(Debug, Clone)]
pub struct InstagramTarget {
    client: Client,
    graph_base: String,
    account_id: String,
    surface: InstagramSurface,
}

impl InstagramTarget {
    pub fn new(client: Client, graph_base: String, account_id: String, surface: InstagramSurface) -> Self {
        Self {
            client,
            graph_base: graph_base.trim_end_matches('/').to_owned(),
            account_id,
            surface,
        }
    }

    pub fn target_id(&self) -> TargetId {
        self.surface.target_id()
    }

    pub fn capability(surface: InstagramSurface, feed_ratio: AspectRatioRange) -> Capability {
        Capability {
            kinds: &[PayloadKind::Image],
            aspect_ratio: match surface {
                InstagramSurface::Feed => Some(feed_ratio),
                InstagramSurface::Story => None,
            },
            needs_hosted_url: true,
        }
    }

    pub async fn publish(&self, payload: &PublishPayload, token: &str) -> Result<Published, PublishError> {
        let image = payload
            .image
            .as_ref()
            .ok_or_else(|| PublishError::Other("no image".to_owned()))?;
        let image_url = image
            .hosted_url
            .as_deref()
            .ok_or_else(|| PublishError::Other("no hosted url".to_owned()))?;

        let creation_id = self
            .create_container(image_url, payload.text(), token)
            .await
            .map_err(|err| match err {
                PublishError::AuthFailure(detail) => PublishError::AuthFailure(detail),
                PublishError::Other(detail) => PublishError::Other(format!("container create failed: {}", detail)),
            })?;

        match self.publish_container(&creation_id, token).await {
            Ok(id) => {
                info!(surface = ?self.surface, media_id = ?id, "instagram media published");
                Ok(Published { id })
            }
            Err(PublishError::AuthFailure(detail)) => Err(PublishError::AuthFailure(format!(
                "{} (container {})",
                detail, creation_id
            ))),
            Err(PublishError::Other(detail)) => Err(PublishError::Other(format!(
                "publish failed for container {}: {}",
                creation_id, detail
            ))),
        }
    }

    async fn create_container(&self, image_url: &str, caption: Option<&str>, token: &str) -> Result<String, PublishError> {
        let mut form = vec![("image_url", image_url), ("access_token", token)];
        match self.surface {
            InstagramSurface::Feed => {
                if let Some(caption) = caption {
                    form.push(("caption", caption));
                }
            }
            InstagramSurface::Story => form.push(("media_type", "STORIES")),
        }

        let response = self
            .client
            .post(format!("{}/{}/media", self.graph_base, self.account_id))
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;
        let body = read_json(response).await?;
        let creation_id = extract_id(&body, "/id")
            .ok_or_else(|| PublishError::Other("no container id in response".to_owned()))?;
        debug!(surface = ?self.surface, creation_id = %creation_id, "instagram container created");
        Ok(creation_id)
    }

    async fn publish_container(&self, creation_id: &str, token: &str) -> Result<Option<String>, PublishError> {
        let response = self
            .client
            .post(format!("{}/{}/media_publish", self.graph_base, self.account_id))
            .form(&[("creation_id", creation_id), ("access_token", token)])
            .send()
            .await
            .map_err(transport_error)?;
        let body = read_json(response).await?;
        extract_id(&body, "/id")
            .map(Some)
            .ok_or_else(|| PublishError::Other("no media id in response".to_owned()))
    }
}
