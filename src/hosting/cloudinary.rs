use anyhow::{anyhow, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::collaborators::CloudinaryConfig;
use crate::config::present;
use crate::dispatch::request::ImageData;
use crate::helpers::http::{describe_transport_error, truncate_body};
use crate::helpers::time::now_i64;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Signed upload to Cloudinary, returning a durable https URL.
#[derive(Clone)]
pub struct CloudinaryHost {
    client: Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for CloudinaryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryHost")
            .field("api_base", &self.api_base)
            .field("cloud_name", &self.cloud_name)
            .finish_non_exhaustive()
    }
}

impl CloudinaryHost {
    pub fn new(client: Client, api_base: String, cloud_name: String, api_key: String, api_secret: String) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_owned(),
            cloud_name,
            api_key,
            api_secret,
        }
    }

    /// `None` when the bundle is incomplete: URL-based targets then fail with "no hosted url".
    pub fn from_config(cfg: &CloudinaryConfig, client: &Client) -> Option<Self> {
        if !cfg.is_complete() {
            return None;
        }
        Some(Self::new(
            client.clone(),
            cfg.api_base.clone(),
            present(&cfg.cloud_name)?.to_owned(),
            present(&cfg.api_key)?.to_owned(),
            present(&cfg.api_secret)?.to_owned(),
        ))
    }

    pub async fn upload(&self, image: &ImageData) -> Result<String> {
        let timestamp = now_i64();
        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)?;
        let form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature_algorithm", "sha256")
            .text("signature", self.sign(timestamp));

        let response = self
            .client
            .post(format!("{}/v1_1/{}/image/upload", self.api_base, self.cloud_name))
            .multipart(form)
            .send()
            .await
            .map_err(|err| anyhow!("image upload failed: {}", describe_transport_error(&err)))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!("image upload rejected with {}: {}", status.as_u16(), truncate_body(&body)));
        }
        let uploaded: UploadResponse = serde_json::from_str(&body).context("image upload response")?;
        info!(url = %uploaded.secure_url, "image hosted");
        Ok(uploaded.secure_url)
    }

    /// Signed parameters sorted by name, concatenated with the secret.
    fn sign(&self, timestamp: i64) -> String {
        let to_sign = format!("timestamp={}{}", timestamp, self.api_secret);
        hex::encode(Sha256::digest(to_sign.as_bytes()))
    }
}
