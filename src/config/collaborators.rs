use serde::Deserialize;

use crate::config::present;
use crate::config::targets::default_telegram_api_base;
use crate::utils::constants::{CLOUDINARY_API_BASE, DEFAULT_POLL_TIMEOUT_SECS};

/// ================================
/// Inbound transport
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InboundConfig {
    pub telegram: Option<TelegramInboundConfig>,
}

impl InboundConfig {
    pub fn bot_token(&self) -> Option<&str> {
        self.telegram.as_ref().and_then(|t| present(&t.bot_token))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramInboundConfig {
    pub bot_token: Option<String>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// long-poll wait; invariant: < settings.request_timeout_seconds
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,
    /// empty accepts every chat
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
}

/// ================================
/// Image hosting
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostingConfig {
    pub cloudinary: Option<CloudinaryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    #[serde(default = "default_cloudinary_api_base")]
    pub api_base: String,
}

impl CloudinaryConfig {
    pub fn is_complete(&self) -> bool {
        present(&self.cloud_name).is_some()
            && present(&self.api_key).is_some()
            && present(&self.api_secret).is_some()
    }
}

fn default_poll_timeout_seconds() -> u64 {
    DEFAULT_POLL_TIMEOUT_SECS
}

fn default_cloudinary_api_base() -> String {
    CLOUDINARY_API_BASE.to_owned()
}
