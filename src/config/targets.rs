use serde::Deserialize;

use crate::config::present;
use crate::utils::constants::{
    GRAPH_API_BASE, INSTAGRAM_FEED_MAX_RATIO, INSTAGRAM_FEED_MIN_RATIO, TELEGRAM_API_BASE,
    TWITTER_API_BASE, TWITTER_TOKEN_URL,
};

/// ================================
/// Publish targets
/// ================================
/// A target is enabled when its bundle has no missing fields.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TargetsConfig {
    pub twitter: Option<TwitterConfig>,
    pub instagram: Option<InstagramConfig>,
    pub facebook: Option<FacebookConfig>,
    pub telegram_channel: Option<TelegramChannelConfig>,
}

/// OAuth2 user context; the initial pair comes from an out-of-band authorization-code exchange.
#[derive(Debug, Deserialize, Clone)]
pub struct TwitterConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// may be empty: the first use then refreshes
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_twitter_token_url")]
    pub token_url: String,
    #[serde(default = "default_twitter_api_base")]
    pub api_base: String,
    /// refreshed pairs are written here and preferred over the config values at startup
    pub credentials_file: Option<String>,
}

impl TwitterConfig {
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(&self.client_id).is_none() {
            missing.push("client_id");
        }
        if present(&self.refresh_token).is_none() {
            missing.push("refresh_token");
        }
        missing
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InstagramConfig {
    /// Instagram business account id
    pub account_id: Option<String>,
    pub access_token: Option<String>,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
    #[serde(default)]
    pub feed_aspect_ratio: AspectRatioConfig,
}

impl InstagramConfig {
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(&self.account_id).is_none() {
            missing.push("account_id");
        }
        if present(&self.access_token).is_none() {
            missing.push("access_token");
        }
        missing
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct AspectRatioConfig {
    pub min: f64,
    pub max: f64,
}

impl Default for AspectRatioConfig {
    fn default() -> Self {
        Self { min: INSTAGRAM_FEED_MIN_RATIO, max: INSTAGRAM_FEED_MAX_RATIO }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FacebookConfig {
    pub page_id: Option<String>,
    /// page access token
    pub access_token: Option<String>,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
}

impl FacebookConfig {
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(&self.page_id).is_none() {
            missing.push("page_id");
        }
        if present(&self.access_token).is_none() {
            missing.push("access_token");
        }
        missing
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramChannelConfig {
    pub channel_id: Option<String>,
    /// defaults to the inbound bot token
    pub bot_token: Option<String>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

impl TelegramChannelConfig {
    pub fn bot_token<'a>(&'a self, inbound_token: Option<&'a str>) -> Option<&'a str> {
        present(&self.bot_token).or(inbound_token)
    }

    pub fn missing(&self, inbound_token: Option<&str>) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(&self.channel_id).is_none() {
            missing.push("channel_id");
        }
        if self.bot_token(inbound_token).is_none() {
            missing.push("bot_token");
        }
        missing
    }
}

fn default_twitter_token_url() -> String {
    TWITTER_TOKEN_URL.to_owned()
}

fn default_twitter_api_base() -> String {
    TWITTER_API_BASE.to_owned()
}

fn default_graph_base() -> String {
    GRAPH_API_BASE.to_owned()
}

pub(crate) fn default_telegram_api_base() -> String {
    TELEGRAM_API_BASE.to_owned()
}
